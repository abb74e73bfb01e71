use thiserror::Error;

use crate::provisioner::ProvisionerState;
use crate::provisioner::fleet::Intent;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("Could not determine provisioner cluster ID and/or proc ID: {0}")]
    IdentityUnresolvable(String),
    #[error("Fleet control plane rejected {intent} of pool {pool}: {reason}")]
    IntentRejected {
        intent: Intent,
        pool: String,
        reason: String,
    },
    #[error("Pool {pool} was not {condition} after {polls} status checks")]
    PollTimeout {
        pool: String,
        condition: &'static str,
        polls: u32,
    },
    #[error("Could not report state {state} of {identity}: {reason}")]
    SinkReportFailure {
        identity: String,
        state: ProvisionerState,
        reason: String,
    },
    #[error("Invalid provisioner state transition from {from} to {to}")]
    InvalidTransition {
        from: ProvisionerState,
        to: ProvisionerState,
    },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
