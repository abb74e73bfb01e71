use std::future::Future;
use std::pin::Pin;
use std::process::Output;

use bstr::ByteSlice;

use crate::provisioner::command::{check_command_output, output_lines, run_command};
use crate::provisioner::fleet::{FleetHandler, PoolStatus};
use crate::provisioner::{ProvisionResult, ResourceRequest};

pub const DEFAULT_ANNEX_PROGRAM: &str = "condor_annex";
pub const DEFAULT_OFF_PROGRAM: &str = "condor_off";

/// Text that `condor_annex` prints when it refuses to create an annex.
const ABORT_MARKER: &str = "aborting";

/// Talks to the EC2 fleet through the HTCondor annex tools.
///
/// A pool is an annex: it is created with `condor_annex -count <n> -annex-name <pool>`,
/// observed with `condor_annex -status` and terminated with `condor_off -annex <pool>`.
pub struct AnnexHandler {
    annex_program: String,
    off_program: String,
}

impl AnnexHandler {
    pub fn new(annex_program: String, off_program: String) -> Self {
        Self {
            annex_program,
            off_program,
        }
    }
}

impl FleetHandler for AnnexHandler {
    fn create_pool(
        &mut self,
        request: &ResourceRequest,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>> {
        let program = self.annex_program.clone();
        let count = request.capacity().to_string();
        let pool_name = request.pool_name().to_string();

        Box::pin(async move {
            let arguments = [
                program.as_str(),
                "-count",
                count.as_str(),
                "-annex-name",
                pool_name.as_str(),
            ];
            // condor_annex asks for a confirmation before it starts any instances
            let output = run_command(&arguments, Some("yes\n")).await?;
            check_intent_output(output)
        })
    }

    fn get_pool_status(
        &self,
        pool_name: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<PoolStatus>>>> {
        let program = self.annex_program.clone();
        let pool_name = pool_name.to_string();

        Box::pin(async move {
            let output = run_command(&[program.as_str(), "-status"], None).await?;
            let output = check_command_output(output)?;
            let stdout = output.stdout.to_str().map_err(|error| {
                anyhow::anyhow!("Invalid UTF-8 in {program} output: {error:?}")
            })?;
            parse_annex_status(stdout, &pool_name)
        })
    }

    fn terminate_pool(
        &self,
        pool_name: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>> {
        let program = self.off_program.clone();
        let pool_name = pool_name.to_string();

        Box::pin(async move {
            let output = run_command(&[program.as_str(), "-annex", pool_name.as_str()], None).await?;
            check_intent_output(output)
        })
    }
}

fn check_intent_output(output: Output) -> ProvisionResult<()> {
    check_intent_lines(&output_lines(&output))?;
    check_command_output(output)?;
    Ok(())
}

/// Fails if the annex tools reported that they gave up on the command.
fn check_intent_lines(lines: &[String]) -> ProvisionResult<()> {
    if lines
        .iter()
        .any(|line| line.to_lowercase().contains(ABORT_MARKER))
    {
        let reason = lines.last().map(String::as_str).unwrap_or(ABORT_MARKER);
        anyhow::bail!("{reason}");
    }
    Ok(())
}

/// Parses the table printed by `condor_annex -status` and returns the member counts of the
/// given pool.
///
/// The header row (the first line that contains both `NAME` and `TOTAL`) names the columns,
/// each following row starts with the name of an annex. Rows of other annexes are ignored, cells
/// that are not numbers are skipped.
pub fn parse_annex_status(output: &str, pool_name: &str) -> ProvisionResult<PoolStatus> {
    let mut columns: Option<Vec<&str>> = None;
    let mut status = PoolStatus::default();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if columns.is_none() && line.contains("NAME") && line.contains("TOTAL") {
            columns = Some(tokens);
            continue;
        }
        if tokens.first() != Some(&pool_name) {
            continue;
        }
        let Some(columns) = columns.as_ref() else {
            anyhow::bail!("Found pool {pool_name} in annex status output before its header");
        };
        for (column, cell) in columns.iter().zip(tokens.iter()).skip(1) {
            if let Ok(count) = cell.parse::<u64>() {
                status.add(*column, count);
            }
        }
    }
    Ok(status)
}
