//! This module drives a pool of cloud nodes through its lifecycle: it asks the fleet control
//! plane (`condor_annex`) for the pool, waits until the pool is usable, keeps it until its
//! expiration and then terminates it again.
//!
//! The current [`ProvisionerState`] is mirrored into state sinks (the job ad of the provisioner
//! job, an event log) after every transition, so that other systems can follow the progress.
mod command;
mod config;
pub mod fleet;
pub mod identity;
mod poll;
mod process;
pub mod sink;
mod state;

pub type ProvisionResult<T> = anyhow::Result<T>;

pub use config::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_DEPROVISION_TIMEOUT, DEFAULT_HOLD_DURATION,
    DEFAULT_PROVISION_TIMEOUT, DEFAULT_RESOURCE_NAME, PollSchedule, ProvisionerConfig,
};
pub use poll::{PollOutcome, poll_until};
pub use process::{IntentMode, Provisioner, acquire, release, wait_until};
pub use state::{
    Identity, PROVISIONER_FAILURE, PROVISIONER_SUCCESS, ProvisionerState, ResourceRequest,
    generate_pool_name,
};
