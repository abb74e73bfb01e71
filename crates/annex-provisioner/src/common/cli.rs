use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use clap::Parser;

use crate::common::env::{
    CONDOR_JOB_AD, PROVISIONER_ANNEX_PROGRAM, PROVISIONER_COMMAND_TIMEOUT, PROVISIONER_COUNT,
    PROVISIONER_DEBUG, PROVISIONER_DEPROVISION_TIMEOUT, PROVISIONER_EVENT_LOG,
    PROVISIONER_EXPIRATION, PROVISIONER_HOLD, PROVISIONER_OFF_PROGRAM,
    PROVISIONER_PROVISION_TIMEOUT, PROVISIONER_QEDIT_PROGRAM, PROVISIONER_RESOURCE_ID,
    PROVISIONER_RESOURCE_NAME, PROVISIONER_STATE,
};
use crate::common::error::ProvisionerError;
use crate::common::timeutils::unix_to_system_time;
use crate::provisioner::fleet::annex::{AnnexHandler, DEFAULT_ANNEX_PROGRAM, DEFAULT_OFF_PROGRAM};
use crate::provisioner::identity::JobAdResolver;
use crate::provisioner::sink::MultiSink;
use crate::provisioner::sink::eventlog::{DEFAULT_EVENT_LOG_PATH, EventLogFormat, EventLogSink};
use crate::provisioner::sink::qedit::{DEFAULT_QEDIT_PROGRAM, QeditSink};
use crate::provisioner::{
    DEFAULT_DEPROVISION_TIMEOUT, DEFAULT_PROVISION_TIMEOUT, DEFAULT_RESOURCE_NAME,
    ProvisionerConfig, ProvisionerState, ResourceRequest, generate_pool_name,
};

// Root CLI options
#[derive(Parser, Debug)]
#[command(
    author,
    about,
    version(crate::PROVISIONER_VERSION),
    help_expected(true)
)]
pub struct ProvisionerOpts {
    /// State to start from.
    /// Anything else than NONE resumes the work of a previous provisioner run.
    #[arg(long, env = PROVISIONER_STATE, default_value_t = ProvisionerState::New)]
    pub state: ProvisionerState,

    /// Name of the annex (pool) to manage.
    /// Generated from `--resource-name` if not given; required when resuming.
    #[arg(long, env = PROVISIONER_RESOURCE_ID)]
    pub resource_id: Option<String>,

    /// Base of the generated annex name
    #[arg(long, env = PROVISIONER_RESOURCE_NAME, default_value = DEFAULT_RESOURCE_NAME)]
    pub resource_name: String,

    /// Time (unix timestamp in seconds) at which the resources are released.
    /// Defaults to the current time plus `--hold`.
    #[arg(long, env = PROVISIONER_EXPIRATION)]
    pub expiration: Option<u64>,

    /// How long are the resources kept if no `--expiration` was given
    #[arg(long, env = PROVISIONER_HOLD, default_value = "5m", value_parser = humantime::parse_duration)]
    pub hold: Duration,

    /// Number of nodes to provision
    #[arg(long, env = PROVISIONER_COUNT, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub count: u32,

    /// How many status checks (one per second) are performed before provisioning fails
    #[arg(long, env = PROVISIONER_PROVISION_TIMEOUT, default_value_t = DEFAULT_PROVISION_TIMEOUT)]
    pub provision_timeout: u32,

    /// How many status checks (one per second) are performed before deprovisioning fails
    #[arg(long, env = PROVISIONER_DEPROVISION_TIMEOUT, default_value_t = DEFAULT_DEPROVISION_TIMEOUT)]
    pub deprovision_timeout: u32,

    /// Longest time a single call of an HTCondor tool may take.
    /// A status check that takes longer counts as an unsuccessful one.
    #[arg(long, env = PROVISIONER_COMMAND_TIMEOUT, default_value = "30s", value_parser = humantime::parse_duration)]
    pub command_timeout: Duration,

    /// Program that creates annexes and reports their status
    #[arg(long, env = PROVISIONER_ANNEX_PROGRAM, default_value = DEFAULT_ANNEX_PROGRAM)]
    pub annex_program: String,

    /// Program that terminates annexes
    #[arg(long, env = PROVISIONER_OFF_PROGRAM, default_value = DEFAULT_OFF_PROGRAM)]
    pub off_program: String,

    /// Program that updates the job ad of the provisioner job
    #[arg(long, env = PROVISIONER_QEDIT_PROGRAM, default_value = DEFAULT_QEDIT_PROGRAM)]
    pub qedit_program: String,

    /// Job ad file of the job on whose behalf the provisioner runs
    #[arg(long, env = CONDOR_JOB_AD, value_hint = clap::ValueHint::FilePath)]
    pub job_ad: Option<PathBuf>,

    /// File into which state changes are appended
    #[arg(
        long,
        env = PROVISIONER_EVENT_LOG,
        default_value = DEFAULT_EVENT_LOG_PATH,
        value_hint = clap::ValueHint::FilePath
    )]
    pub event_log: PathBuf,

    /// Format of the event log
    #[arg(long, value_enum, default_value_t = EventLogFormat::Userlog)]
    pub event_log_format: EventLogFormat,

    /// Do not write state changes into the event log
    #[arg(long)]
    pub no_event_log: bool,

    /// Enables more detailed log output
    #[arg(long, env = PROVISIONER_DEBUG)]
    pub debug: bool,
}

impl ProvisionerOpts {
    /// Builds the request for the managed pool.
    ///
    /// `now` is the start of the hold window when no explicit expiration was given.
    pub fn resource_request(&self, now: SystemTime) -> crate::Result<ResourceRequest> {
        let pool_name = match &self.resource_id {
            Some(resource_id) => resource_id.clone(),
            None if self.state == ProvisionerState::New || self.state.is_terminal() => {
                generate_pool_name(&self.resource_name)
            }
            None => {
                return Err(ProvisionerError::InvalidConfig(format!(
                    "Resuming from state {} requires the name of the annex (--resource-id)",
                    self.state
                )));
            }
        };
        let expiration = match self.expiration {
            Some(timestamp) => unix_to_system_time(timestamp).ok_or_else(|| {
                ProvisionerError::InvalidConfig(format!(
                    "Expiration timestamp {timestamp} is out of range"
                ))
            })?,
            None => now.checked_add(self.hold).ok_or_else(|| {
                ProvisionerError::InvalidConfig(format!(
                    "Hold duration {} is out of range",
                    humantime::format_duration(self.hold)
                ))
            })?,
        };
        ResourceRequest::new(pool_name, self.count, expiration)
    }

    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            provision_timeout: self.provision_timeout,
            deprovision_timeout: self.deprovision_timeout,
            command_timeout: self.command_timeout,
            ..Default::default()
        }
    }

    pub fn fleet_handler(&self) -> AnnexHandler {
        AnnexHandler::new(self.annex_program.clone(), self.off_program.clone())
    }

    pub fn identity_resolver(&self) -> JobAdResolver {
        match &self.job_ad {
            Some(path) => JobAdResolver::new(path.clone()),
            None => JobAdResolver::from_env(),
        }
    }

    /// The job ad of the provisioner job is always updated, the event log only if enabled.
    pub fn state_sink(&self) -> MultiSink {
        let mut sink = MultiSink::default();
        sink.add(QeditSink::new(self.qedit_program.clone()));
        if !self.no_event_log {
            sink.add(EventLogSink::new(
                self.event_log.clone(),
                self.event_log_format,
            ));
        }
        sink
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{Duration, UNIX_EPOCH};

    use clap::Parser;

    use crate::common::cli::ProvisionerOpts;
    use crate::common::error::ProvisionerError;
    use crate::provisioner::sink::eventlog::EventLogFormat;
    use crate::provisioner::{
        DEFAULT_COMMAND_TIMEOUT, DEFAULT_HOLD_DURATION, DEFAULT_RESOURCE_NAME, ProvisionerState,
    };

    fn parse(args: &[&str]) -> ProvisionerOpts {
        ProvisionerOpts::try_parse_from(
            std::iter::once("annex-provisioner").chain(args.iter().copied()),
        )
        .unwrap()
    }

    #[test]
    fn defaults() {
        let opts = parse(&[]);
        assert_eq!(opts.state, ProvisionerState::New);
        assert_eq!(opts.resource_id, None);
        assert_eq!(opts.resource_name, DEFAULT_RESOURCE_NAME);
        assert_eq!(opts.hold, DEFAULT_HOLD_DURATION);
        assert_eq!(opts.count, 1);
        assert_eq!(opts.provision_timeout, 300);
        assert_eq!(opts.deprovision_timeout, 120);
        assert_eq!(opts.event_log, PathBuf::from("annex-provisioner.log"));
        assert_eq!(opts.event_log_format, EventLogFormat::Userlog);
        assert!(!opts.no_event_log);
        assert_eq!(opts.command_timeout, DEFAULT_COMMAND_TIMEOUT);
        assert_eq!(opts.annex_program, "condor_annex");
        assert_eq!(opts.off_program, "condor_off");
        assert_eq!(opts.qedit_program, "condor_qedit");
    }

    #[test]
    fn override_programs() {
        let opts = parse(&[
            "--annex-program",
            "/opt/site/annex",
            "--off-program",
            "/opt/site/off",
            "--qedit-program",
            "/opt/site/qedit",
            "--command-timeout",
            "2m",
        ]);
        assert_eq!(opts.annex_program, "/opt/site/annex");
        assert_eq!(opts.off_program, "/opt/site/off");
        assert_eq!(opts.qedit_program, "/opt/site/qedit");
        assert_eq!(
            opts.provisioner_config().command_timeout,
            Duration::from_secs(120)
        );
    }

    #[test]
    fn reject_out_of_range_expiration() {
        let opts = parse(&["--expiration", "18446744073709551615"]);
        assert!(matches!(
            opts.resource_request(UNIX_EPOCH),
            Err(ProvisionerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn parse_state_wire_names() {
        let opts = parse(&["--state", "PROVISIONING ACTIVE"]);
        assert_eq!(opts.state, ProvisionerState::ProvisioningStarted);
        let opts = parse(&["--state", "deprovisioning_active"]);
        assert_eq!(opts.state, ProvisionerState::DeprovisioningStarted);
    }

    #[test]
    fn reject_unknown_state() {
        assert!(ProvisionerOpts::try_parse_from(["annex-provisioner", "--state", "RUNNING"]).is_err());
    }

    #[test]
    fn reject_zero_count() {
        assert!(ProvisionerOpts::try_parse_from(["annex-provisioner", "--count", "0"]).is_err());
    }

    #[test]
    fn parse_hold() {
        let opts = parse(&["--hold", "1h 30m"]);
        assert_eq!(opts.hold, Duration::from_secs(90 * 60));
    }

    #[test]
    fn request_with_generated_name() {
        let opts = parse(&["--resource-name", "Foo", "--count", "4", "--hold", "10m"]);
        let now = UNIX_EPOCH + Duration::from_secs(1000);
        let request = opts.resource_request(now).unwrap();

        let suffix = request.pool_name().strip_prefix("Foo").unwrap();
        let number: u32 = suffix.parse().unwrap();
        assert!((1..=100_000).contains(&number));
        assert_eq!(request.capacity(), 4);
        assert_eq!(request.expiration(), now + Duration::from_secs(600));
    }

    #[test]
    fn request_with_explicit_values() {
        let opts = parse(&["--resource-id", "MyAnnex", "--expiration", "2000"]);
        let request = opts
            .resource_request(UNIX_EPOCH + Duration::from_secs(1000))
            .unwrap();
        assert_eq!(request.pool_name(), "MyAnnex");
        assert_eq!(request.expiration(), UNIX_EPOCH + Duration::from_secs(2000));
    }

    #[test]
    fn resuming_requires_resource_id() {
        for state in ["PROVISIONING ACTIVE", "PROVISIONING COMPLETE", "DEPROVISIONING ACTIVE"] {
            let opts = parse(&["--state", state]);
            assert!(matches!(
                opts.resource_request(UNIX_EPOCH),
                Err(ProvisionerError::InvalidConfig(_))
            ));

            let opts = parse(&["--state", state, "--resource-id", "EC2Annex5"]);
            assert_eq!(
                opts.resource_request(UNIX_EPOCH).unwrap().pool_name(),
                "EC2Annex5"
            );
        }
    }

    #[test]
    fn terminal_state_does_not_require_resource_id() {
        let opts = parse(&["--state", "FAILED"]);
        assert!(opts.resource_request(UNIX_EPOCH).is_ok());
    }

    #[test]
    fn config_from_options() {
        let opts = parse(&["--provision-timeout", "10", "--deprovision-timeout", "5"]);
        let config = opts.provisioner_config();
        assert_eq!(config.provision_timeout, 10);
        assert_eq!(config.deprovision_timeout, 5);
        assert!(opts.provisioner_config().validate().is_ok());

        let opts = parse(&["--provision-timeout", "0"]);
        assert!(opts.provisioner_config().validate().is_err());
    }

    #[test]
    fn event_log_can_be_disabled() {
        assert_eq!(parse(&[]).state_sink().len(), 2);
        assert_eq!(parse(&["--no-event-log"]).state_sink().len(), 1);
    }
}
