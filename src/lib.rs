//! userservice - user records with optimistic concurrency and change events
//!
//! Layers, bottom up:
//! - `persistence`: the record store (in-memory or Postgres) and the
//!   observed decorator that reports committed changes
//! - `event`: change observers and the topic publisher
//! - `service`: validation and service-owned fields
//! - `http_server`: the JSON API
//! - `metrics`: request and store counters served on `/metrics`
//! - `cli`: configuration and process wiring

pub mod cli;
pub mod config;
pub mod context;
pub mod event;
pub mod http_server;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod service;
