//! User service
//!
//! Business rules on top of a [`UserRepository`](crate::persistence::UserRepository):
//! validation, service-owned fields and the error taxonomy exposed to callers.

mod clock;
mod credentials;
mod errors;
mod user_service;
mod validation;

pub use clock::{Clock, FixedClock, FixedIdGenerator, IdGenerator, SystemClock, UuidGenerator};
pub use credentials::{hash_password, verify_password, PasswordPolicy};
pub use errors::{ServiceError, ServiceResult, STATUS_CLIENT_CLOSED_REQUEST};
pub use user_service::UserService;
