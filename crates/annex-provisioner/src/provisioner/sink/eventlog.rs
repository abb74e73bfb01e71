use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Context;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::common::timeutils::now_wallclock;
use crate::provisioner::sink::StateSink;
use crate::provisioner::{Identity, ProvisionResult, ProvisionerState};

pub const DEFAULT_EVENT_LOG_PATH: &str = "annex-provisioner.log";

#[derive(clap::ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventLogFormat {
    /// Blocks in the style of an HTCondor job event log.
    Userlog,
    /// One JSON object per line.
    Json,
}

/// Appends one event per state change into a local file.
pub struct EventLogSink {
    path: PathBuf,
    format: EventLogFormat,
    hostname: String,
}

impl EventLogSink {
    pub fn new(path: PathBuf, format: EventLogFormat) -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().into_owned();
        Self {
            path,
            format,
            hostname,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    time: DateTime<Utc>,
    cluster: u64,
    proc: u64,
    state: ProvisionerState,
    resource_id: &'a str,
}

fn format_event(
    format: EventLogFormat,
    hostname: &str,
    identity: &Identity,
    state: ProvisionerState,
    resource_id: &str,
) -> ProvisionResult<String> {
    let now = now_wallclock();
    let event = match format {
        EventLogFormat::Userlog => {
            let time: DateTime<Local> = now.into();
            format!(
                "000 ({:03}.{:03}.000) {} Provisioner enter {state} state on host: {hostname}\n...\n",
                identity.cluster_id,
                identity.proc_id,
                time.format("%m/%d %H:%M:%S"),
            )
        }
        EventLogFormat::Json => {
            let event = JsonEvent {
                time: now.into(),
                cluster: identity.cluster_id,
                proc: identity.proc_id,
                state,
                resource_id,
            };
            let mut line = serde_json::to_string(&event)?;
            line.push('\n');
            line
        }
    };
    Ok(event)
}

impl StateSink for EventLogSink {
    fn report(
        &self,
        identity: &Identity,
        state: ProvisionerState,
        resource_id: &str,
    ) -> Pin<Box<dyn Future<Output = ProvisionResult<()>>>> {
        let event = format_event(self.format, &self.hostname, identity, state, resource_id);
        let path = self.path.clone();

        Box::pin(async move {
            let event = event?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .with_context(|| format!("Cannot open event log {}", path.display()))?;
            file.write_all(event.as_bytes())
                .await
                .with_context(|| format!("Cannot write into event log {}", path.display()))?;
            file.flush()
                .await
                .with_context(|| format!("Cannot write into event log {}", path.display()))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use crate::common::timeutils::mock_time::MockTime;
    use crate::provisioner::sink::StateSink;
    use crate::provisioner::sink::eventlog::{EventLogFormat, EventLogSink};
    use crate::provisioner::{Identity, ProvisionerState};

    #[tokio::test]
    async fn append_userlog_events() {
        let dir = tempfile::TempDir::with_prefix("provisioner").unwrap();
        let sink = EventLogSink::new(dir.path().join("events.log"), EventLogFormat::Userlog);
        let identity = Identity::new(12, 0);

        sink.report(&identity, ProvisionerState::ProvisioningStarted, "EC2Annex1")
            .await
            .unwrap();
        sink.report(&identity, ProvisionerState::ProvisioningComplete, "EC2Annex1")
            .await
            .unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("000 (012.000.000) "));
        assert!(lines[0].contains("Provisioner enter PROVISIONING ACTIVE state on host: "));
        assert_eq!(lines[1], "...");
        assert!(lines[2].contains("Provisioner enter PROVISIONING COMPLETE state"));
        assert_eq!(lines[3], "...");
    }

    #[tokio::test]
    async fn append_json_events() {
        let _mock = MockTime::mock(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let dir = tempfile::TempDir::with_prefix("provisioner").unwrap();
        let sink = EventLogSink::new(dir.path().join("events.jsonl"), EventLogFormat::Json);

        sink.report(
            &Identity::new(12, 3),
            ProvisionerState::DeprovisioningComplete,
            "EC2Annex1",
        )
        .await
        .unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let event: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(event["time"], "2023-11-14T22:13:20Z");
        assert_eq!(event["cluster"], 12);
        assert_eq!(event["proc"], 3);
        assert_eq!(event["state"], "DEPROVISIONING COMPLETE");
        assert_eq!(event["resource_id"], "EC2Annex1");
    }

    #[tokio::test]
    async fn unwritable_event_log() {
        let dir = tempfile::TempDir::with_prefix("provisioner").unwrap();
        let sink = EventLogSink::new(
            dir.path().join("missing").join("events.log"),
            EventLogFormat::Userlog,
        );
        assert!(
            sink.report(&Identity::new(1, 0), ProvisionerState::Failed, "EC2Annex1")
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn keep_existing_events() {
        let dir = tempfile::TempDir::with_prefix("provisioner").unwrap();
        let path = dir.path().join("events.log");
        std::fs::write(&path, "earlier event\n").unwrap();
        let sink = EventLogSink::new(path, EventLogFormat::Json);

        sink.report(&Identity::new(1, 0), ProvisionerState::New, "EC2Annex1")
            .await
            .unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "earlier event");
        assert!(lines[1].contains("\"state\":\"NONE\""));
    }
}
