//! CLI module
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP server
//! - migrate: Apply the Postgres schema

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command, ConfigArgs};
pub use commands::{migrate, run, run_command, serve};
pub use errors::{CliError, CliResult};
