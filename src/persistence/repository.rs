//! User repository trait
//!
//! Abstracts storage operations for users. Implementations own the
//! optimistic-concurrency check on update; decorators such as
//! [`ObservedRepository`](super::ObservedRepository) implement the same trait
//! so they can be stacked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use crate::context::RequestContext;
use crate::model::{User, UserField};

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. `id`, `created_at` and `updated_at` must already be set.
    ///
    /// Fails with `Conflict` if a user with that id already exists.
    async fn create(&self, ctx: &RequestContext, user: &User) -> StoreResult<()>;

    /// Overwrite the user with the same id, provided the stored row still has
    /// `user.created_at` and `expected_updated_at`.
    ///
    /// The check and the write happen atomically under an exclusive hold on the
    /// row. Fails with `NotFound` if there is no such user and with `Conflict` if
    /// the stored timestamps differ.
    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Fetch a user by id, or `NotFound`.
    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<User>;

    /// Remove a user by id. `NotFound` if nothing was removed.
    async fn delete(&self, ctx: &RequestContext, id: &str) -> StoreResult<()>;

    /// All users, ordered by id.
    async fn list_all(&self, ctx: &RequestContext) -> StoreResult<Vec<User>>;

    /// Users whose `field` equals `value`, ordered by id.
    async fn list_by(
        &self,
        ctx: &RequestContext,
        field: UserField,
        value: &str,
    ) -> StoreResult<Vec<User>>;
}
