use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::Map;
use crate::common::env::CONDOR_JOB_AD;
use crate::provisioner::{Identity, ProvisionResult};

const CLUSTER_ID_KEY: &str = "ClusterId";
const PROC_ID_KEY: &str = "ProcId";

/// Finds out which job the provisioner acts for.
pub trait IdentityResolver {
    fn resolve(&self) -> ProvisionResult<Identity>;
}

/// Reads the identity from the job ad file that HTCondor provides to every running job.
pub struct JobAdResolver {
    path: Option<PathBuf>,
}

impl JobAdResolver {
    /// Uses the given job ad file.
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Uses the job ad file pointed to by the `_CONDOR_JOB_AD` environment variable.
    pub fn from_env() -> Self {
        Self {
            path: std::env::var_os(CONDOR_JOB_AD).map(PathBuf::from),
        }
    }
}

impl IdentityResolver for JobAdResolver {
    fn resolve(&self) -> ProvisionResult<Identity> {
        let path = self.path.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Environment variable {CONDOR_JOB_AD} is not set")
        })?;
        read_job_ad_identity(path)
    }
}

fn read_job_ad_identity(path: &Path) -> ProvisionResult<Identity> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read job ad file {}", path.display()))?;
    parse_job_ad_identity(&content)
        .with_context(|| format!("Invalid job ad file {}", path.display()))
}

/// Parse `<key> = <value>` pairs of a ClassAd in the "long" format.
pub fn get_job_ad_items(content: &str) -> Map<&str, &str> {
    let mut map = Map::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim(), value.trim());
        }
    }
    map
}

pub fn parse_job_ad_identity(content: &str) -> ProvisionResult<Identity> {
    let items = get_job_ad_items(content);
    let get_id = |key: &str| -> ProvisionResult<u64> {
        let value = items
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("Missing key {key} in job ad"))?;
        value
            .parse::<u64>()
            .map_err(|error| anyhow::anyhow!("Cannot parse {key} value `{value}`: {error}"))
    };
    Ok(Identity::new(get_id(CLUSTER_ID_KEY)?, get_id(PROC_ID_KEY)?))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::provisioner::Identity;
    use crate::provisioner::identity::{IdentityResolver, JobAdResolver, parse_job_ad_identity};

    const JOB_AD: &str = r#"AutoClusterId = 17
BufferBlockSize = 32768
ClusterId = 1234
Cmd = "/usr/bin/annex-provisioner"
ProcId = 0
ProvisionerState = "NONE"
"#;

    #[test]
    fn parse_identity() {
        assert_eq!(
            parse_job_ad_identity(JOB_AD).unwrap(),
            Identity::new(1234, 0)
        );
    }

    #[test]
    fn auto_cluster_id_is_not_cluster_id() {
        let error = parse_job_ad_identity("AutoClusterId = 17\nProcId = 0\n").unwrap_err();
        assert_eq!(error.to_string(), "Missing key ClusterId in job ad");
    }

    #[test]
    fn invalid_proc_id() {
        assert!(parse_job_ad_identity("ClusterId = 1\nProcId = -1\n").is_err());
        assert!(parse_job_ad_identity("ClusterId = 1\nProcId = \"x\"\n").is_err());
    }

    #[test]
    fn resolve_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(JOB_AD.as_bytes()).unwrap();

        let resolver = JobAdResolver::new(file.path().to_path_buf());
        assert_eq!(resolver.resolve().unwrap(), Identity::new(1234, 0));
    }

    #[test]
    fn resolve_missing_file() {
        let dir = tempfile::TempDir::with_prefix("provisioner").unwrap();
        let resolver = JobAdResolver::new(dir.path().join("job.ad"));
        assert!(resolver.resolve().is_err());
    }

    #[test]
    fn resolve_without_path() {
        let resolver = JobAdResolver { path: None };
        assert!(resolver.resolve().is_err());
    }
}
