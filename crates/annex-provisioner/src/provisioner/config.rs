use std::time::Duration;

use crate::common::env::{PROVISIONER_HOLD_LOG_INTERVAL_MS, PROVISIONER_POLL_INTERVAL_MS};
use crate::common::error::ProvisionerError;

/// Base of generated pool names.
pub const DEFAULT_RESOURCE_NAME: &str = "EC2Annex";

/// How long are the resources kept if no expiration was given.
pub const DEFAULT_HOLD_DURATION: Duration = Duration::from_secs(5 * 60);

/// How many status checks are performed before provisioning is considered to have failed.
pub const DEFAULT_PROVISION_TIMEOUT: u32 = 300;

/// How many status checks are performed before deprovisioning is considered to have failed.
pub const DEFAULT_DEPROVISION_TIMEOUT: u32 = 120;

/// Longest time a single call of an external tool (`condor_annex`, `condor_off`, `condor_qedit`)
/// may take before it is abandoned.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Time between successive status checks of the pool.
pub fn get_poll_interval() -> Duration {
    get_duration_from_env(PROVISIONER_POLL_INTERVAL_MS).unwrap_or(Duration::from_secs(1))
}

/// How often is the remaining time printed while waiting for the expiration.
pub fn get_hold_log_interval() -> Duration {
    get_duration_from_env(PROVISIONER_HOLD_LOG_INTERVAL_MS).unwrap_or(Duration::from_secs(60))
}

fn get_duration_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// How an operation waits for the pool: at most `budget` status checks, `interval` apart, each
/// of them (and the intent that precedes them) abandoned after `command_timeout`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    pub budget: u32,
    pub interval: Duration,
    pub command_timeout: Duration,
}

/// Timing of the provisioner. Timeouts are expressed as a number of status checks, which are
/// performed once per `poll_interval`.
#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    pub provision_timeout: u32,
    pub deprovision_timeout: u32,
    pub poll_interval: Duration,
    pub hold_log_interval: Duration,
    pub command_timeout: Duration,
}

impl ProvisionerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.provision_timeout == 0 || self.deprovision_timeout == 0 {
            return Err(ProvisionerError::InvalidConfig(
                "Timeouts have to allow at least one status check".to_string(),
            ));
        }
        if self.poll_interval.is_zero() || self.hold_log_interval.is_zero() {
            return Err(ProvisionerError::InvalidConfig(
                "Poll and hold log intervals cannot be zero".to_string(),
            ));
        }
        if self.command_timeout.is_zero() {
            return Err(ProvisionerError::InvalidConfig(
                "Command timeout cannot be zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn provisioning_schedule(&self) -> PollSchedule {
        PollSchedule {
            budget: self.provision_timeout,
            interval: self.poll_interval,
            command_timeout: self.command_timeout,
        }
    }

    pub fn deprovisioning_schedule(&self) -> PollSchedule {
        PollSchedule {
            budget: self.deprovision_timeout,
            interval: self.poll_interval,
            command_timeout: self.command_timeout,
        }
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            provision_timeout: DEFAULT_PROVISION_TIMEOUT,
            deprovision_timeout: DEFAULT_DEPROVISION_TIMEOUT,
            poll_interval: get_poll_interval(),
            hold_log_interval: get_hold_log_interval(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::provisioner::config::ProvisionerConfig;

    #[test]
    fn default_config_is_valid() {
        ProvisionerConfig::default().validate().unwrap();
    }

    #[test]
    fn reject_zero_timeouts() {
        let config = ProvisionerConfig {
            provision_timeout: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProvisionerConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn reject_zero_command_timeout() {
        let config = ProvisionerConfig {
            command_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn schedules_use_matching_budget() {
        let config = ProvisionerConfig {
            provision_timeout: 7,
            deprovision_timeout: 3,
            poll_interval: Duration::from_secs(2),
            hold_log_interval: Duration::from_secs(60),
            command_timeout: Duration::from_secs(5),
        };
        let schedule = config.provisioning_schedule();
        assert_eq!(schedule.budget, 7);
        assert_eq!(schedule.interval, Duration::from_secs(2));
        assert_eq!(schedule.command_timeout, Duration::from_secs(5));
        assert_eq!(config.deprovisioning_schedule().budget, 3);
    }
}
