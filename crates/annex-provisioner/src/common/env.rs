macro_rules! create_provisioner_env {
    ($name: literal) => {
        concat!("ANNEX_PROVISIONER_", $name)
    };
}

/// Path to the job ad of the job the provisioner runs as, set by the HTCondor starter.
pub const CONDOR_JOB_AD: &str = "_CONDOR_JOB_AD";

/// Known environment variables
pub const PROVISIONER_STATE: &str = create_provisioner_env!("STATE");
pub const PROVISIONER_RESOURCE_ID: &str = create_provisioner_env!("RESOURCE_ID");
pub const PROVISIONER_RESOURCE_NAME: &str = create_provisioner_env!("RESOURCE_NAME");
pub const PROVISIONER_EXPIRATION: &str = create_provisioner_env!("EXPIRATION");
pub const PROVISIONER_HOLD: &str = create_provisioner_env!("HOLD");
pub const PROVISIONER_COUNT: &str = create_provisioner_env!("COUNT");
pub const PROVISIONER_PROVISION_TIMEOUT: &str = create_provisioner_env!("PROVISION_TIMEOUT");
pub const PROVISIONER_DEPROVISION_TIMEOUT: &str = create_provisioner_env!("DEPROVISION_TIMEOUT");
pub const PROVISIONER_EVENT_LOG: &str = create_provisioner_env!("EVENT_LOG");
pub const PROVISIONER_DEBUG: &str = create_provisioner_env!("DEBUG");
pub const PROVISIONER_POLL_INTERVAL_MS: &str = create_provisioner_env!("POLL_INTERVAL_MS");
pub const PROVISIONER_HOLD_LOG_INTERVAL_MS: &str = create_provisioner_env!("HOLD_LOG_INTERVAL_MS");
pub const PROVISIONER_COMMAND_TIMEOUT: &str = create_provisioner_env!("COMMAND_TIMEOUT");
pub const PROVISIONER_ANNEX_PROGRAM: &str = create_provisioner_env!("ANNEX_PROGRAM");
pub const PROVISIONER_OFF_PROGRAM: &str = create_provisioner_env!("OFF_PROGRAM");
pub const PROVISIONER_QEDIT_PROGRAM: &str = create_provisioner_env!("QEDIT_PROGRAM");
