//! # Notification Errors

use thiserror::Error;

/// Result type for notification delivery
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Errors raised while delivering a change notification.
///
/// These never reach API callers; the observed repository logs and drops them.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// Payload could not be encoded
    #[error("can't encode payload: {0}")]
    Encode(String),

    /// Downstream channel has no room
    #[error("channel full")]
    ChannelFull,

    /// Downstream channel is gone
    #[error("channel closed")]
    ChannelClosed,

    /// Delivery did not finish in time
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// Any other producer failure
    #[error("publish failed: {0}")]
    Publish(String),
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        NotifyError::Encode(err.to_string())
    }
}
