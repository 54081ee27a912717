//! CLI argument definitions using clap
//!
//! Commands:
//! - userservice serve [--config <path>]
//! - userservice migrate [--config <path>]
//!
//! Every override can also come from an `APP_*` environment variable.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Config, ConfigResult, StorageBackend};

/// User record service
#[derive(Parser, Debug)]
#[command(name = "userservice")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve(ConfigArgs),

    /// Apply the Postgres schema migrations and exit
    Migrate(ConfigArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to configuration file
    #[arg(long, env = "APP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "APP_HOST")]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(long, env = "APP_PORT")]
    pub port: Option<u16>,

    /// Postgres connection URL; selects the postgres backend
    #[arg(long, env = "APP_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, env = "APP_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output logs in JSON format
    #[arg(long, env = "APP_JSON_LOGS")]
    pub json_logs: bool,
}

impl ConfigArgs {
    /// Load the config file (if any), then apply command line overrides
    pub fn resolve(&self) -> ConfigResult<Config> {
        let mut config = Config::load_or_default(self.config.as_deref())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = &self.database_url {
            config.storage.backend = StorageBackend::Postgres;
            config.storage.postgres.url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
