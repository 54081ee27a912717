//! # Store Errors
//!
//! Error types for the persistence module.

use thiserror::Error;

use crate::context::Interrupted;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Store errors
///
/// Stores only ever report `NotFound` and `Conflict` as business outcomes;
/// everything else is an interruption or an opaque infrastructure fault.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row for that id
    #[error("not found")]
    NotFound,

    /// Duplicate id on create, or stale modification timestamp on update
    #[error("conflict")]
    Conflict,

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Connectivity, malformed data, or anything unclassified
    #[error("storage error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl From<Interrupted> for StoreError {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => StoreError::Cancelled,
            Interrupted::DeadlineExceeded => StoreError::DeadlineExceeded,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interruptions_map() {
        assert!(matches!(
            StoreError::from(Interrupted::Cancelled),
            StoreError::Cancelled
        ));
        assert!(matches!(
            StoreError::from(Interrupted::DeadlineExceeded),
            StoreError::DeadlineExceeded
        ));
    }

    #[test]
    fn test_unexpected_keeps_source_message() {
        let err = StoreError::from(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "storage error: connection reset");
    }
}
