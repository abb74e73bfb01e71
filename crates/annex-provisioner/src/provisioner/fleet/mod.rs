pub mod annex;

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::Map;
use crate::provisioner::{ProvisionResult, ResourceRequest};

/// Pool members that have joined the HTCondor pool and can run jobs.
pub const IN_POOL_PHASE: &str = "in-pool";
/// Pool members whose instances have been terminated.
pub const TERMINATED_PHASE: &str = "terminated";

/// One-shot command sent to the fleet control plane.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Intent {
    Create,
    Terminate,
}

impl Display for Intent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Create => f.write_str("creation"),
            Intent::Terminate => f.write_str("termination"),
        }
    }
}

/// Snapshot of the members of a single pool, counted by their lifecycle phase.
///
/// It is recomputed on every status query and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStatus {
    counts: Map<String, u64>,
}

impl PoolStatus {
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut status = PoolStatus::default();
        for (phase, count) in counts {
            status.add(phase, count);
        }
        status
    }

    pub fn add<S: Into<String>>(&mut self, phase: S, count: u64) {
        *self.counts.entry(phase.into()).or_default() += count;
    }

    pub fn count(&self, phase: &str) -> u64 {
        self.counts.get(phase).copied().unwrap_or(0)
    }

    /// Number of members that joined the pool.
    pub fn joined(&self) -> u64 {
        self.count(IN_POOL_PHASE)
    }

    pub fn terminated(&self) -> u64 {
        self.count(TERMINATED_PHASE)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn phases(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(phase, count)| (phase.as_str(), *count))
    }
}

impl Display for PoolStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return f.write_str("<no members>");
        }
        let mut phases: Vec<_> = self.phases().collect();
        phases.sort_unstable();
        for (index, (phase, count)) in phases.into_iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{phase}={count}")?;
        }
        Ok(())
    }
}

/// Handler that can communicate with a fleet control plane (e.g. `condor_annex`).
///
/// Creation and termination are intents: the returned future resolves once the control plane
/// has accepted (or refused) the command, not once the members are up or gone.
pub trait FleetHandler {
    /// Ask the control plane to create the requested pool.
    /// An error means that the intent was rejected.
    fn create_pool(
        &mut self,
        request: &ResourceRequest,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>>;

    /// Get the current status of the members of the given pool.
    /// A pool that the control plane does not know about has an empty status.
    fn get_pool_status(
        &self,
        pool_name: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<PoolStatus>>>>;

    /// Ask the control plane to terminate all members of the given pool.
    /// An error means that the intent was rejected.
    fn terminate_pool(
        &self,
        pool_name: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>>;
}
