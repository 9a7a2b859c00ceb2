use std::{path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};

use crate::{charges::ChargeRounding, fetcher::RemoteSource};

/// Public bucket holding the precomputed results.
pub const DEFAULT_REMOTE_URL: &str =
    "https://s3.cl4.du.cesnet.cz/46b646c0_b0c7_45dd_8c7f_29536a545ca7:ceitec-biodata-pdbcharges";

/// Server settings, read from a yaml file and/or the command line.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    /// Number of HTTP workers. Defaults to the number of CPU cores.
    pub workers: Option<usize>,
    pub cache_dir: PathBuf,
    /// Base URL of the result store. `file://` points at a local mirror.
    pub remote_url: String,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub fetch_timeout: Duration,
    pub max_object_size: usize,
    /// Extra assets served under `/static`. Nothing is served when unset.
    pub static_dir: Option<PathBuf>,
    /// Defaults to `{cache_dir}/accesses.txt`
    pub access_log: Option<PathBuf>,
    pub charge_rounding: ChargeRounding,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".into(),
            port: 8080,
            workers: None,
            cache_dir: PathBuf::from("calculated_structures"),
            remote_url: DEFAULT_REMOTE_URL.into(),
            fetch_timeout: Duration::from_secs(30),
            max_object_size: 256 * 1024 * 1024,
            static_dir: None,
            access_log: None,
            charge_rounding: ChargeRounding::Nearest,
        }
    }
}

impl ServerConfig {
    /// Load settings from a yaml file. Missing keys keep their defaults.
    pub fn load(yml_file: impl AsRef<Path>) -> anyhow::Result<Self> {
        log::debug!("Reading server config from {}", yml_file.as_ref().display());
        let config: ServerConfig = serde_yaml::from_reader(
            std::fs::OpenOptions::new().read(true).open(yml_file)?)?;
        Ok(config)
    }

    pub fn access_log_path(&self) -> PathBuf {
        self.access_log.clone().unwrap_or_else(|| self.cache_dir.join("accesses.txt"))
    }

    pub fn remote_source(&self) -> RemoteSource {
        RemoteSource::from_url(&self.remote_url, self.fetch_timeout, self.max_object_size)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yml = concat!(
            "port: 9000\n",
            "cache_dir: /var/cache/pdbcharges\n",
            "fetch_timeout: 5\n",
            "charge_rounding: unrounded\n",
        );
        let config: ServerConfig = serde_yaml::from_str(yml).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert_eq!(config.charge_rounding, ChargeRounding::Unrounded);
        assert_eq!(config.remote_url, DEFAULT_REMOTE_URL);
        assert_eq!(config.static_dir, None);
        assert_eq!(config.access_log_path(), PathBuf::from("/var/cache/pdbcharges/accesses.txt"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(serde_yaml::from_str::<ServerConfig>("prot: 9000\n").is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.yml");
        std::fs::write(&path, "remote_url: file:///srv/mirror\naccess_log: /tmp/a.log\n").unwrap();
        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.access_log_path(), PathBuf::from("/tmp/a.log"));
        assert!(matches!(config.remote_source(), RemoteSource::Directory(_)));
        assert!(ServerConfig::load(dir.path().join("missing.yml")).is_err());
    }
}
