//! Metered repository
//!
//! Counts every call to the wrapped [`UserRepository`] by operation and
//! outcome. Results are passed through untouched.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use super::repository::UserRepository;
use crate::context::RequestContext;
use crate::metrics::{store_outcome, MetricsRegistry};
use crate::model::{User, UserField};

pub struct MeteredRepository {
    inner: Arc<dyn UserRepository>,
    metrics: Arc<MetricsRegistry>,
}

impl MeteredRepository {
    pub fn new(inner: Arc<dyn UserRepository>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { inner, metrics }
    }

    fn record<T>(&self, operation: &'static str, result: StoreResult<T>) -> StoreResult<T> {
        self.metrics.record_store(operation, store_outcome(&result));
        result
    }
}

#[async_trait]
impl UserRepository for MeteredRepository {
    async fn create(&self, ctx: &RequestContext, user: &User) -> StoreResult<()> {
        let result = self.inner.create(ctx, user).await;
        self.record("create", result)
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = self.inner.update(ctx, user, expected_updated_at).await;
        self.record("update", result)
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<User> {
        let result = self.inner.get(ctx, id).await;
        self.record("get", result)
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> StoreResult<()> {
        let result = self.inner.delete(ctx, id).await;
        self.record("delete", result)
    }

    async fn list_all(&self, ctx: &RequestContext) -> StoreResult<Vec<User>> {
        let result = self.inner.list_all(ctx).await;
        self.record("list_all", result)
    }

    async fn list_by(
        &self,
        ctx: &RequestContext,
        field: UserField,
        value: &str,
    ) -> StoreResult<Vec<User>> {
        let result = self.inner.list_by(ctx, field, value).await;
        self.record("list_by", result)
    }
}
