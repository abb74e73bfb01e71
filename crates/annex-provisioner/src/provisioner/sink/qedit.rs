use std::future::Future;
use std::pin::Pin;

use anyhow::Context;

use crate::provisioner::command::{check_command_output, run_command};
use crate::provisioner::sink::StateSink;
use crate::provisioner::{Identity, ProvisionResult, ProvisionerState};

pub const DEFAULT_QEDIT_PROGRAM: &str = "condor_qedit";

/// Job ad attribute that holds the provisioner state.
pub const STATE_ATTRIBUTE: &str = "ProvisionerState";
/// Job ad attribute that holds the name of the provisioned pool.
pub const RESOURCE_ID_ATTRIBUTE: &str = "ProvisionerResourceID";

/// Mirrors the state into the job ad of the provisioner job using `condor_qedit`, so that it
/// can be observed with `condor_q` (or by DAGMan).
pub struct QeditSink {
    program: String,
}

impl QeditSink {
    pub fn new(program: String) -> Self {
        Self { program }
    }
}

impl StateSink for QeditSink {
    fn report(
        &self,
        identity: &Identity,
        state: ProvisionerState,
        resource_id: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>> {
        let program = self.program.clone();
        let job_id = identity.to_string();
        let attributes = [
            (STATE_ATTRIBUTE, classad_string(state.as_str())),
            (RESOURCE_ID_ATTRIBUTE, classad_string(resource_id)),
        ];

        Box::pin(async move {
            // The state goes first, observers key off of it
            for (attribute, value) in attributes {
                let arguments = [program.as_str(), job_id.as_str(), attribute, value.as_str()];
                let output = run_command(&arguments, None).await?;
                check_command_output(output)
                    .with_context(|| format!("Cannot set {attribute} of job {job_id}"))?;
            }
            Ok(())
        })
    }
}

/// Formats a ClassAd string literal.
pub fn classad_string(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
