//! # Change Observers
//!
//! Interface between the observed repository and whatever wants to hear
//! about committed mutations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::errors::NotifyResult;
use crate::context::RequestContext;
use crate::model::User;

/// Kind of committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Created => write!(f, "created"),
            ChangeKind::Updated => write!(f, "updated"),
            ChangeKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// A committed change, borrowed from the mutation that produced it
#[derive(Debug, Clone, Copy)]
pub struct Change<'a> {
    pub kind: ChangeKind,
    pub id: &'a str,
    /// The written record; `None` for deletions
    pub record: Option<&'a User>,
}

impl<'a> Change<'a> {
    pub fn created(user: &'a User) -> Self {
        Self {
            kind: ChangeKind::Created,
            id: &user.id,
            record: Some(user),
        }
    }

    pub fn updated(user: &'a User) -> Self {
        Self {
            kind: ChangeKind::Updated,
            id: &user.id,
            record: Some(user),
        }
    }

    pub fn deleted(id: &'a str) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            id,
            record: None,
        }
    }
}

/// Receives committed changes.
///
/// Called synchronously after the store commits. Implementations should
/// return promptly; the observed repository bounds each call with a timeout
/// anyway.
#[async_trait]
pub trait ChangeObserver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn notify(&self, ctx: &RequestContext, change: &Change<'_>) -> NotifyResult<()>;
}
