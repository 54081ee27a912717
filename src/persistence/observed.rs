//! Observed repository
//!
//! Decorates a [`UserRepository`] so that every successful create, update and
//! delete is reported to the registered [`ChangeObserver`]s, in registration
//! order. Observers run after the inner store has returned (and so after its
//! commit, outside any row lock). Their failures are logged and dropped: the
//! caller always gets the store's own outcome.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use super::repository::UserRepository;
use crate::context::RequestContext;
use crate::event::{Change, ChangeObserver, NotifyError};
use crate::metrics::MetricsRegistry;
use crate::model::{User, UserField};

/// Default bound on a single observer call
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

pub struct ObservedRepository {
    inner: Arc<dyn UserRepository>,
    observers: Vec<Arc<dyn ChangeObserver>>,
    notify_timeout: Duration,
    metrics: Arc<MetricsRegistry>,
}

impl ObservedRepository {
    pub fn new(inner: Arc<dyn UserRepository>, observers: Vec<Arc<dyn ChangeObserver>>) -> Self {
        Self {
            inner,
            observers,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Count notification failures in a shared registry
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    async fn notify_all(&self, ctx: &RequestContext, change: Change<'_>) {
        for observer in &self.observers {
            let result = tokio::time::timeout(self.notify_timeout, observer.notify(ctx, &change))
                .await
                .unwrap_or_else(|_| Err(NotifyError::Timeout(self.notify_timeout.as_millis() as u64)));

            if let Err(err) = result {
                self.metrics.increment_notify_failures();
                tracing::warn!(
                    observer = observer.name(),
                    kind = %change.kind,
                    user_id = change.id,
                    request_id = %ctx.request_id,
                    error = %err,
                    "can't notify observer"
                );
            }
        }
    }
}

#[async_trait]
impl UserRepository for ObservedRepository {
    async fn create(&self, ctx: &RequestContext, user: &User) -> StoreResult<()> {
        self.inner.create(ctx, user).await?;
        self.notify_all(ctx, Change::created(user)).await;
        Ok(())
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner.update(ctx, user, expected_updated_at).await?;
        self.notify_all(ctx, Change::updated(user)).await;
        Ok(())
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<User> {
        self.inner.get(ctx, id).await
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> StoreResult<()> {
        self.inner.delete(ctx, id).await?;
        self.notify_all(ctx, Change::deleted(id)).await;
        Ok(())
    }

    async fn list_all(&self, ctx: &RequestContext) -> StoreResult<Vec<User>> {
        self.inner.list_all(ctx).await
    }

    async fn list_by(
        &self,
        ctx: &RequestContext,
        field: UserField,
        value: &str,
    ) -> StoreResult<Vec<User>> {
        self.inner.list_by(ctx, field, value).await
    }
}
