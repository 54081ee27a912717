//! User service
//!
//! Validates input, derives the service-owned fields (id, timestamps,
//! password hash) and translates store outcomes into [`ServiceError`].

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use super::clock::{Clock, IdGenerator, SystemClock, UuidGenerator};
use super::credentials::{hash_password, PasswordPolicy};
use super::errors::{ServiceError, ServiceResult};
use super::validation::{validate_for_create, validate_for_update};
use crate::context::RequestContext;
use crate::model::{truncate_timestamp, User, UserField, UserInput};
use crate::persistence::{StoreError, UserRepository};

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    policy: PasswordPolicy,
}

impl UserService {
    /// Service using the wall clock and random UUIDs
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self {
            repo,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            policy: PasswordPolicy::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        truncate_timestamp(self.clock.now())
    }

    /// Create a user. `id`, `created_at` and `updated_at` must be unset; the
    /// service fills them in and returns the stored record.
    pub async fn create(&self, ctx: &RequestContext, input: UserInput) -> ServiceResult<User> {
        validate_for_create(&input, &self.policy)?;

        let password_hash = hash_password(input.password.as_deref().unwrap_or_default())?;
        let now = self.now();
        let user = User {
            id: self.ids.generate(),
            created_at: now,
            updated_at: now,
            first_name: input.first_name,
            last_name: input.last_name,
            name: input.name,
            email: input.email,
            country: input.country,
            password_hash,
        };

        match self.repo.create(ctx, &user).await {
            Ok(()) => Ok(user),
            // The generator is expected to be collision free; a duplicate is our bug.
            Err(StoreError::Conflict) => Err(ServiceError::Internal(format!(
                "generated a duplicated id {}",
                user.id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Update the user `id`.
    ///
    /// `input.created_at` and `input.updated_at` must be the values the caller
    /// last read; if the stored user has moved on, the update fails with
    /// `Conflict`. Without a new password the stored hash is kept.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: &str,
        input: UserInput,
    ) -> ServiceResult<User> {
        validate_for_update(&input, &self.policy)?;

        let (Some(created_at), Some(expected)) = (input.created_at, input.updated_at) else {
            return Err(ServiceError::invalid("created_at and updated_at should be provided"));
        };
        let created_at = truncate_timestamp(created_at);
        let expected = truncate_timestamp(expected);
        let updated_at = self.next_modification(expected)?;

        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => hash_password(password)?,
            None => {
                let current = self.repo.get(ctx, id).await?;
                if current.created_at != created_at || current.updated_at != expected {
                    return Err(ServiceError::Conflict);
                }
                current.password_hash
            }
        };

        let user = User {
            id: id.to_string(),
            created_at,
            updated_at,
            first_name: input.first_name,
            last_name: input.last_name,
            name: input.name,
            email: input.email,
            country: input.country,
            password_hash,
        };

        self.repo.update(ctx, &user, expected).await?;
        Ok(user)
    }

    /// Modification timestamps strictly increase even if the clock stalls or
    /// steps backwards.
    fn next_modification(&self, previous: DateTime<Utc>) -> ServiceResult<DateTime<Utc>> {
        let successor = previous
            .checked_add_signed(TimeDelta::microseconds(1))
            .ok_or_else(|| ServiceError::invalid("updated_at is out of range"))?;
        Ok(self.now().max(successor))
    }

    pub async fn get(&self, ctx: &RequestContext, id: &str) -> ServiceResult<User> {
        Ok(self.repo.get(ctx, id).await?)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> ServiceResult<()> {
        Ok(self.repo.delete(ctx, id).await?)
    }

    pub async fn list_all(&self, ctx: &RequestContext) -> ServiceResult<Vec<User>> {
        Ok(strip_credentials(self.repo.list_all(ctx).await?))
    }

    pub async fn list_by(
        &self,
        ctx: &RequestContext,
        field: UserField,
        value: &str,
    ) -> ServiceResult<Vec<User>> {
        Ok(strip_credentials(self.repo.list_by(ctx, field, value).await?))
    }
}

fn strip_credentials(mut users: Vec<User>) -> Vec<User> {
    for user in &mut users {
        user.password_hash.clear();
    }
    users
}
