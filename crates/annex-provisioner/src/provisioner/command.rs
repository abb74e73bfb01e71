use std::process::{Output, Stdio};

use anyhow::Context;
use bstr::ByteSlice;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::provisioner::ProvisionResult;

pub fn create_command(arguments: &[&str]) -> Command {
    let mut command = Command::new(arguments[0]);
    command.args(&arguments[1..]);
    command.stdin(Stdio::null());
    command.kill_on_drop(true);
    command
}

/// Runs the command, optionally writes `input` into its stdin, and waits for its output.
pub async fn run_command(arguments: &[&str], input: Option<&str>) -> ProvisionResult<Output> {
    let program = arguments[0];
    log::debug!("Running command `{}`", arguments.join(" "));

    let mut command = create_command(arguments);
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
    if input.is_some() {
        command.stdin(Stdio::piped());
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("{program} start failed"))?;
    if let Some(input) = input {
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(error) = stdin.write_all(input.as_bytes()).await {
                log::debug!("Cannot write input into {program}: {error}");
            }
        }
    }
    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("{program} execution failed"))?;

    log::trace!(
        "{program} output\nStdout\n{}Stderr\n{}",
        output.stdout.to_str_lossy(),
        output.stderr.to_str_lossy()
    );
    Ok(output)
}

pub fn check_command_output(output: Output) -> ProvisionResult<Output> {
    let status = output.status;
    if !status.success() {
        return Err(anyhow::anyhow!(
            "Exit code: {}\nStderr: {}\nStdout: {}",
            status.code().unwrap_or(-1),
            output.stderr.to_str_lossy().trim(),
            output.stdout.to_str_lossy().trim()
        ));
    }
    Ok(output)
}

/// Returns all non-empty lines of stdout followed by all non-empty lines of stderr.
pub fn output_lines(output: &Output) -> Vec<String> {
    [&output.stdout, &output.stderr]
        .into_iter()
        .flat_map(|stream| {
            stream
                .lines()
                .map(|line| line.to_str_lossy().trim().to_string())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}
