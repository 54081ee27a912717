//! # Persistence
//!
//! User record storage: the repository contract, its in-memory and Postgres
//! implementations, and the change-notifying and metering decorators.

pub mod errors;
pub mod memory;
pub mod metered;
pub mod observed;
pub mod postgres;
pub mod repository;

pub use errors::{StoreError, StoreResult};
pub use memory::InMemoryUserRepository;
pub use metered::MeteredRepository;
pub use observed::{ObservedRepository, DEFAULT_NOTIFY_TIMEOUT};
pub use postgres::{PostgresConfig, PostgresUserRepository};
pub use repository::UserRepository;
