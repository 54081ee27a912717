//! # Service Errors
//!
//! The stable error taxonomy handed to the HTTP layer.

use thiserror::Error;

use crate::persistence::StoreError;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Status used when the caller went away before we could answer.
/// Not a real HTTP status; borrowed from nginx so it never reads as a 5xx.
pub const STATUS_CLIENT_CLOSED_REQUEST: u16 = 499;

/// Service errors
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No user with that id
    #[error("not found")]
    NotFound,

    /// The user changed since the caller last read it
    #[error("conflict updating: the user was modified concurrently")]
    Conflict,

    /// Caller-supplied data failed validation
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// The request deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Infrastructure fault, id collision, or anything unclassified
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InvalidParams(_) => 400,
            ServiceError::NotFound => 404,
            ServiceError::Conflict => 409,
            ServiceError::Cancelled => STATUS_CLIENT_CLOSED_REQUEST,
            ServiceError::DeadlineExceeded => 504,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Whether this is a server fault worth logging as an error
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServiceError::Internal(_) | ServiceError::DeadlineExceeded)
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ServiceError::InvalidParams(msg.into())
    }
}

impl From<StoreError> for ServiceError {
    /// Default mapping for reads and deletes. Create and update refine
    /// `Conflict` themselves.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Conflict => ServiceError::Conflict,
            StoreError::Cancelled => ServiceError::Cancelled,
            StoreError::DeadlineExceeded => ServiceError::DeadlineExceeded,
            StoreError::Unexpected(e) => ServiceError::Internal(format!("{e:#}")),
        }
    }
}
