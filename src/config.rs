//! TOML configuration shared by the server and the sync client.
//!
//! Every field has a default, so an absent file or a file containing only
//! the sections a deployment cares about is valid.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::FileStorage;
use crate::sync::DrainSettings;

const CONFIG_FILE: &str = "inksync.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("No platform data directory; set an explicit path in the config")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Fallback `env_logger` filter when `RUST_LOG` is unset
    pub log_level: String,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 7878)),
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub queue_dir: Option<PathBuf>,
    pub base_interval_secs: u64,
    pub backoff_unit_secs: u64,
    pub backoff_max_secs: u64,
    pub request_timeout_secs: u64,
    /// 0 disables the reachability probe
    pub probe_interval_secs: u64,
    pub stale_max_age_hours: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:7878".to_string(),
            queue_dir: None,
            base_interval_secs: 5,
            backoff_unit_secs: 5,
            backoff_max_secs: 60,
            request_timeout_secs: 30,
            probe_interval_secs: 15,
            stale_max_age_hours: 168,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file at the default location yields the defaults; a
    /// missing explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `<config dir>/inksync/inksync.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("inksync").join(CONFIG_FILE))
    }

    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.server.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => FileStorage::default_data_dir().map_err(|_| ConfigError::NoDataDir),
        }
    }

    pub fn resolved_queue_dir(&self) -> Result<PathBuf> {
        match &self.client.queue_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|d| d.join("inksync").join("queue"))
                .ok_or(ConfigError::NoDataDir),
        }
    }
}

impl ClientConfig {
    pub fn drain_settings(&self) -> DrainSettings {
        DrainSettings {
            base_interval: Duration::from_secs(self.base_interval_secs),
            backoff_unit: Duration::from_secs(self.backoff_unit_secs),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
            stale_max_age: Duration::from_secs(self.stale_max_age_hours * 60 * 60),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// `None` when the probe is disabled.
    pub fn probe_interval(&self) -> Option<Duration> {
        (self.probe_interval_secs > 0).then(|| Duration::from_secs(self.probe_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.client.drain_settings(), DrainSettings::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
log_level = "debug"

[server]
bind = "0.0.0.0:9000"

[client]
backoff_max_secs = 120
probe_interval_secs = 0
"#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.bind.port(), 9000);
        assert_eq!(config.server.data_dir, None);
        assert_eq!(config.client.backoff_max_secs, 120);
        assert_eq!(config.client.backoff_unit_secs, 5);
        assert_eq!(config.client.probe_interval(), None);
    }

    #[test]
    fn test_explicit_dirs_win() {
        let config = Config::parse(
            r#"
[server]
data_dir = "/srv/inksync"

[client]
queue_dir = "/tmp/q"
"#,
        )
        .unwrap();
        assert_eq!(config.resolved_data_dir().unwrap(), PathBuf::from("/srv/inksync"));
        assert_eq!(config.resolved_queue_dir().unwrap(), PathBuf::from("/tmp/q"));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inksync.toml");

        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Read { .. })
        ));

        fs::write(&path, "[client]\nserver_url = \"http://sync.local:80\"\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.client.server_url, "http://sync.local:80");

        fs::write(&path, "[client\n").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
