//! # Configuration
//!
//! JSON configuration file. Every field has a default, so an empty object
//! (or no file at all) is a valid in-memory development setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::TopicConfig;
use crate::http_server::HttpServerConfig;
use crate::persistence::{PostgresConfig, DEFAULT_NOTIFY_TIMEOUT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: HttpServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

/// Change notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Bound on a single observer call, in milliseconds
    #[serde(default = "default_notify_timeout_ms")]
    pub notify_timeout_ms: u64,

    /// Capacity of the in-process message channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub topics: TopicConfig,
}

fn default_notify_timeout_ms() -> u64 {
    DEFAULT_NOTIFY_TIMEOUT.as_millis() as u64
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            notify_timeout_ms: default_notify_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            topics: TopicConfig::default(),
        }
    }
}

impl EventsConfig {
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Load `path` if given, otherwise start from defaults
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_json::from_str(content)?;
        Ok(config)
    }

    /// Reject settings the server can't run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.backend == StorageBackend::Postgres && self.storage.postgres.url.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.postgres.url is required for the postgres backend".to_string(),
            ));
        }
        if self.storage.postgres.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "storage.postgres.max_connections must be > 0".to_string(),
            ));
        }
        if self.storage.postgres.acquire_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "storage.postgres.acquire_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.events.notify_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "events.notify_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "events.channel_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.events.notify_timeout(), Duration::from_secs(2));
        assert_eq!(config.events.topics.created, "user.created");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "server": {{"port": 9000, "request_timeout_ms": 500}},
                "storage": {{"backend": "postgres", "postgres": {{"url": "postgres://localhost/users"}}}},
                "events": {{"topics": {{"deleted": "accounts.deleted"}}}},
                "logging": {{"level": "debug", "json": true}}
            }}"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout_ms, 500);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.storage.postgres.max_connections, 10);
        assert_eq!(config.events.topics.deleted, "accounts.deleted");
        assert_eq!(config.events.topics.updated, "user.updated");
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"storage": {"backend": "mysql"}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unusable_settings() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Postgres;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.events.channel_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.request_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.events.notify_timeout_ms = 0;
        assert!(config.validate().is_err());
    }
}
