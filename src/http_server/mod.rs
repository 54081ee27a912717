//! # HTTP Server Module
//!
//! axum server exposing the user service.
//!
//! # Endpoints
//!
//! - `/status` - Liveness check
//! - `/v1/users` - List (`?country=` or `?email=`) and create users
//! - `/v1/users/:id` - Get, update and delete a user

pub mod config;
pub mod server;
pub mod user_routes;

pub use config::HttpServerConfig;
pub use server::HttpServer;
pub use user_routes::ErrorResponse;
