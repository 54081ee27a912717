//! Request Context
//!
//! Context carried from the HTTP layer down to the stores.
//! Carries the request id for logging plus the caller's cancellation
//! signal and deadline.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why an operation stopped before completing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    /// The caller went away or the server is shutting down
    #[error("operation cancelled")]
    Cancelled,

    /// The request deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Context carried through a single request
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request ID for tracing
    pub request_id: Uuid,

    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Create a context with its own cancellation token and no deadline
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Create a context cancelled by the given token
    pub fn with_token(cancel: CancellationToken) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel,
            deadline: None,
        }
    }

    /// Set a deadline `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set an absolute deadline
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context (and every operation racing on it)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Check the context before starting work
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Run `fut` until it completes, the context is cancelled, or the deadline passes.
    ///
    /// On interruption the future is dropped, which releases any lock guard or
    /// open transaction it holds.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at.into()).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            () = deadline => Err(Interrupted::DeadlineExceeded),
            value = fut => Ok(value),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
