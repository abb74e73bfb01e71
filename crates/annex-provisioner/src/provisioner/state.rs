use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::SystemTime;

use rand::Rng;
use serde::Serialize;

use crate::common::error::ProvisionerError;

/// Lifecycle phase of the provisioner.
///
/// The happy path is strictly ordered, `New` → `ProvisioningStarted` → `ProvisioningComplete`
/// → `DeprovisioningStarted` → `DeprovisioningComplete`. `Failed` is a terminal state outside of
/// this ordering.
///
/// The wire representation (see [`ProvisionerState::as_str`]) is what gets written into the job
/// record and the event log, and what the `--state` option accepts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ProvisionerState {
    #[serde(rename = "NONE")]
    New,
    #[serde(rename = "PROVISIONING ACTIVE")]
    ProvisioningStarted,
    #[serde(rename = "PROVISIONING COMPLETE")]
    ProvisioningComplete,
    #[serde(rename = "DEPROVISIONING ACTIVE")]
    DeprovisioningStarted,
    #[serde(rename = "DEPROVISIONING COMPLETE")]
    DeprovisioningComplete,
    #[serde(rename = "FAILED")]
    Failed,
}

impl ProvisionerState {
    pub const ALL: [ProvisionerState; 6] = [
        ProvisionerState::New,
        ProvisionerState::ProvisioningStarted,
        ProvisionerState::ProvisioningComplete,
        ProvisionerState::DeprovisioningStarted,
        ProvisionerState::DeprovisioningComplete,
        ProvisionerState::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionerState::New => "NONE",
            ProvisionerState::ProvisioningStarted => "PROVISIONING ACTIVE",
            ProvisionerState::ProvisioningComplete => "PROVISIONING COMPLETE",
            ProvisionerState::DeprovisioningStarted => "DEPROVISIONING ACTIVE",
            ProvisionerState::DeprovisioningComplete => "DEPROVISIONING COMPLETE",
            ProvisionerState::Failed => "FAILED",
        }
    }

    /// Position on the happy path. `Failed` has no position.
    pub fn ordinal(&self) -> Option<u8> {
        match self {
            ProvisionerState::New => Some(0),
            ProvisionerState::ProvisioningStarted => Some(1),
            ProvisionerState::ProvisioningComplete => Some(2),
            ProvisionerState::DeprovisioningStarted => Some(3),
            ProvisionerState::DeprovisioningComplete => Some(4),
            ProvisionerState::Failed => None,
        }
    }

    /// The following state on the happy path.
    pub fn next(&self) -> Option<ProvisionerState> {
        match self {
            ProvisionerState::New => Some(ProvisionerState::ProvisioningStarted),
            ProvisionerState::ProvisioningStarted => Some(ProvisionerState::ProvisioningComplete),
            ProvisionerState::ProvisioningComplete => Some(ProvisionerState::DeprovisioningStarted),
            ProvisionerState::DeprovisioningStarted => {
                Some(ProvisionerState::DeprovisioningComplete)
            }
            ProvisionerState::DeprovisioningComplete | ProvisionerState::Failed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisionerState::DeprovisioningComplete | ProvisionerState::Failed
        )
    }

    /// States in which an action is in flight (or about to be), so that its failure moves the
    /// provisioner into `Failed`.
    pub fn can_fail(&self) -> bool {
        matches!(
            self,
            ProvisionerState::New
                | ProvisionerState::ProvisioningStarted
                | ProvisionerState::DeprovisioningStarted
        )
    }

    /// Checks that the provisioner may move from `self` to `target`.
    /// Only single steps forward on the happy path and failures of active states are allowed.
    pub fn check_transition(&self, target: ProvisionerState) -> crate::Result<()> {
        let allowed = match target {
            ProvisionerState::Failed => self.can_fail(),
            target => self.next() == Some(target),
        };
        if allowed {
            Ok(())
        } else {
            Err(ProvisionerError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Process exit code that corresponds to the final state of the provisioner.
    pub fn exit_code(&self) -> u8 {
        match self {
            ProvisionerState::DeprovisioningComplete => PROVISIONER_SUCCESS,
            _ => PROVISIONER_FAILURE,
        }
    }
}

pub const PROVISIONER_SUCCESS: u8 = 0;
pub const PROVISIONER_FAILURE: u8 = 1;

impl Display for ProvisionerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisionerState {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace(['_', '-'], " ").to_uppercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown provisioner state `{value}`, expected one of: {}",
                    Self::ALL.map(|state| state.as_str()).join(", ")
                )
            })
    }
}

/// Identifies the HTCondor job on whose behalf the provisioner acts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Identity {
    pub cluster_id: u64,
    pub proc_id: u64,
}

impl Identity {
    pub fn new(cluster_id: u64, proc_id: u64) -> Self {
        Self {
            cluster_id,
            proc_id,
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.cluster_id, self.proc_id)
    }
}

/// The pool that should be provisioned. Immutable once the provisioner starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pool_name: String,
    capacity: u32,
    expiration: SystemTime,
}

impl ResourceRequest {
    pub fn new(pool_name: String, capacity: u32, expiration: SystemTime) -> crate::Result<Self> {
        if pool_name.is_empty() || pool_name.chars().any(char::is_whitespace) {
            return Err(ProvisionerError::InvalidConfig(format!(
                "Invalid resource pool name `{pool_name}`"
            )));
        }
        if capacity == 0 {
            return Err(ProvisionerError::InvalidConfig(
                "Requested capacity has to be at least 1".to_string(),
            ));
        }
        Ok(Self {
            pool_name,
            capacity,
            expiration,
        })
    }

    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn expiration(&self) -> SystemTime {
        self.expiration
    }
}

/// Creates a pool name from `base` and a random numeric suffix.
pub fn generate_pool_name(base: &str) -> String {
    let suffix: u32 = rand::rng().random_range(1..=100_000);
    format!("{base}{suffix}")
}
