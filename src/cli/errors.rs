//! CLI-specific error types
//!
//! All CLI errors are fatal: `main` prints them and exits non-zero.

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::config::ConfigError;
use crate::persistence::StoreError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialise logging: {0}")]
    Logging(#[from] TryInitError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
