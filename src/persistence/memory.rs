//! In-memory user repository
//!
//! Rows live in an ordered map; each row sits behind its own async mutex,
//! which plays the role of a row-level exclusive lock. Update and Delete hold
//! that lock for the whole check-then-write, so writers on one id serialize
//! while writers on different ids proceed independently.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::errors::{StoreError, StoreResult};
use super::repository::UserRepository;
use crate::context::RequestContext;
use crate::model::{User, UserField};

/// A row is `None` once deleted; it stays that way until it is unlinked.
type Row = Arc<Mutex<Option<User>>>;

#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    rows: RwLock<BTreeMap<String, Row>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, id: &str) -> StoreResult<Option<Row>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(id).cloned())
    }

    fn snapshot(&self) -> StoreResult<Vec<Row>> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.values().cloned().collect())
    }

    async fn collect<F>(&self, keep: F) -> StoreResult<Vec<User>>
    where
        F: Fn(&User) -> bool,
    {
        let mut users = Vec::new();
        for row in self.snapshot()? {
            if let Some(user) = row.lock().await.as_ref() {
                if keep(user) {
                    users.push(user.clone());
                }
            }
        }
        Ok(users)
    }
}

fn poisoned() -> StoreError {
    StoreError::Unexpected(anyhow!("lock poisoned"))
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, ctx: &RequestContext, user: &User) -> StoreResult<()> {
        ctx.check()?;

        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        if rows.contains_key(&user.id) {
            return Err(StoreError::Conflict);
        }
        rows.insert(user.id.clone(), Arc::new(Mutex::new(Some(user.clone()))));
        Ok(())
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let row = self.row(&user.id)?.ok_or(StoreError::NotFound)?;

        ctx.run(async {
            let mut guard = row.lock().await;
            let current = guard.as_ref().ok_or(StoreError::NotFound)?;

            if current.created_at != user.created_at || current.updated_at != expected_updated_at {
                return Err(StoreError::Conflict);
            }

            *guard = Some(user.clone());
            Ok(())
        })
        .await?
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<User> {
        let row = self.row(id)?.ok_or(StoreError::NotFound)?;

        ctx.run(async { row.lock().await.clone().ok_or(StoreError::NotFound) })
            .await?
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> StoreResult<()> {
        let row = self.row(id)?.ok_or(StoreError::NotFound)?;

        ctx.run(async {
            let mut guard = row.lock().await;
            if guard.take().is_none() {
                return Err(StoreError::NotFound);
            }

            // Unlink while still holding the row, so a waiting writer sees the tombstone.
            let mut rows = self.rows.write().map_err(|_| poisoned())?;
            if rows.get(id).is_some_and(|linked| Arc::ptr_eq(linked, &row)) {
                rows.remove(id);
            }
            Ok(())
        })
        .await?
    }

    async fn list_all(&self, ctx: &RequestContext) -> StoreResult<Vec<User>> {
        ctx.run(self.collect(|_| true)).await?
    }

    async fn list_by(
        &self,
        ctx: &RequestContext,
        field: UserField,
        value: &str,
    ) -> StoreResult<Vec<User>> {
        ctx.run(self.collect(|user| field.value_of(user) == value))
            .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()
    }

    fn user(id: &str, country: &str) -> User {
        User {
            id: id.to_string(),
            created_at: t0(),
            updated_at: t0(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            name: "j".to_string(),
            email: format!("{id}@example.com"),
            country: country.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryUserRepository::new();
        let ctx = RequestContext::new();

        repo.create(&ctx, &user("u1", "es")).await.unwrap();
        assert_eq!(repo.get(&ctx, "u1").await.unwrap(), user("u1", "es"));
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts_without_overwriting() {
        let repo = InMemoryUserRepository::new();
        let ctx = RequestContext::new();
        repo.create(&ctx, &user("u1", "es")).await.unwrap();

        let mut other = user("u1", "fr");
        other.name = "someone else".to_string();
        assert!(matches!(
            repo.create(&ctx, &other).await,
            Err(StoreError::Conflict)
        ));
        assert_eq!(repo.get(&ctx, "u1").await.unwrap().country, "es");
    }

    #[tokio::test]
    async fn test_update_checks_timestamps() {
        let repo = InMemoryUserRepository::new();
        let ctx = RequestContext::new();
        repo.create(&ctx, &user("u1", "es")).await.unwrap();

        let mut next = user("u1", "fr");
        next.updated_at = t0() + TimeDelta::seconds(1);
        repo.update(&ctx, &next, t0()).await.unwrap();
        assert_eq!(repo.get(&ctx, "u1").await.unwrap(), next);

        // same expected timestamp again is now stale
        assert!(matches!(
            repo.update(&ctx, &next, t0()).await,
            Err(StoreError::Conflict)
        ));

        // created_at must match too
        let mut wrong_created = next.clone();
        wrong_created.created_at = t0() - TimeDelta::seconds(1);
        assert!(matches!(
            repo.update(&ctx, &wrong_created, next.updated_at).await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let ctx = RequestContext::new();
        assert!(matches!(
            repo.update(&ctx, &user("nope", "es"), t0()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_then_not_found() {
        let repo = InMemoryUserRepository::new();
        let ctx = RequestContext::new();
        repo.create(&ctx, &user("u1", "es")).await.unwrap();

        repo.delete(&ctx, "u1").await.unwrap();
        assert!(matches!(repo.get(&ctx, "u1").await, Err(StoreError::NotFound)));
        assert!(matches!(
            repo.delete(&ctx, "u1").await,
            Err(StoreError::NotFound)
        ));

        // the id is free again
        repo.create(&ctx, &user("u1", "es")).await.unwrap();
    }

    #[tokio::test]
    async fn test_lists_are_ordered_by_id() {
        let repo = InMemoryUserRepository::new();
        let ctx = RequestContext::new();
        for (id, country) in [("c", "es"), ("a", "fr"), ("b", "es")] {
            repo.create(&ctx, &user(id, country)).await.unwrap();
        }

        let ids: Vec<_> = repo
            .list_all(&ctx)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let spanish: Vec<_> = repo
            .list_by(&ctx, UserField::Country, "es")
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(spanish, ["b", "c"]);

        assert!(repo
            .list_by(&ctx, UserField::Country, "zz")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_waits_for_row_lock_and_rolls_back_on_deadline() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let ctx = RequestContext::new();
        repo.create(&ctx, &user("u1", "es")).await.unwrap();

        let row = repo.row("u1").unwrap().unwrap();
        let held = row.lock().await;

        let mut next = user("u1", "fr");
        next.updated_at = t0() + TimeDelta::seconds(1);
        let short = RequestContext::new().with_timeout(std::time::Duration::from_millis(20));
        assert!(matches!(
            repo.update(&short, &next, t0()).await,
            Err(StoreError::DeadlineExceeded)
        ));

        drop(held);
        assert_eq!(repo.get(&ctx, "u1").await.unwrap().country, "es");
    }

    #[tokio::test]
    async fn test_cancelled_context_is_reported() {
        let repo = InMemoryUserRepository::new();
        let ctx = RequestContext::new();
        ctx.cancel();
        assert!(matches!(
            repo.create(&ctx, &user("u1", "es")).await,
            Err(StoreError::Cancelled)
        ));
        assert!(repo.list_all(&RequestContext::new()).await.unwrap().is_empty());
    }
}
