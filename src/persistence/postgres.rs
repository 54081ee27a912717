//! Postgres-backed user repository.
//!
//! One row per user in the `users` table, keyed by `id`, with a secondary
//! index on `country` (see `migrations/`). Timestamps are `TIMESTAMPTZ`, which
//! keeps microseconds; callers truncate before writing.
//!
//! # Optimistic update
//! `update` opens a transaction, locks the row with `SELECT ... FOR UPDATE`,
//! compares the stored `created_at`/`updated_at` with what the caller last saw,
//! and only then writes. Concurrent updates of the same id queue on the row
//! lock; the loser observes the winner's `updated_at` and gets `Conflict`.
//! An interrupted or failed update drops the transaction, which rolls it back.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::errors::{StoreError, StoreResult};
use super::repository::UserRepository;
use crate::context::RequestContext;
use crate::model::{User, UserField};

const SELECT_USERS: &str = "SELECT id, created_at, updated_at, first_name, last_name, name, email, country, password_hash FROM users";

/// Postgres connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Connection URL; may carry credentials, never log it
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Apply embedded migrations when the server starts
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            run_migrations: false,
        }
    }
}

/// Row shape of the `users` table
#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    first_name: String,
    last_name: String,
    name: String,
    email: String,
    country: String,
    password_hash: String,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            first_name: row.first_name,
            last_name: row.last_name,
            name: row.name,
            email: row.email,
            country: row.country,
            password_hash: row.password_hash,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbVersion {
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Connect a pool using `config`.
    pub async fn connect(config: &PostgresConfig) -> StoreResult<Self> {
        let options = PgConnectOptions::from_str(&config.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.into()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn update_in_tx(
        tx: &mut Transaction<'static, Postgres>,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let version = sqlx::query_as::<_, DbVersion>(
            "SELECT created_at, updated_at FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(&user.id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        if version.created_at != user.created_at || version.updated_at != expected_updated_at {
            return Err(StoreError::Conflict);
        }

        sqlx::query(
            r#"UPDATE users
               SET updated_at = $2, first_name = $3, last_name = $4, name = $5,
                   email = $6, country = $7, password_hash = $8
               WHERE id = $1"#,
        )
        .bind(&user.id)
        .bind(user.updated_at)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.country)
        .bind(&user.password_hash)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, ctx: &RequestContext, user: &User) -> StoreResult<()> {
        let insert = sqlx::query(
            r#"INSERT INTO users
               (id, created_at, updated_at, first_name, last_name, name, email, country, password_hash)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&user.id)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.country)
        .bind(&user.password_hash)
        .execute(&self.pool);

        match ctx.run(insert).await? {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        user: &User,
        expected_updated_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        ctx.run(async {
            let mut tx = self.pool.begin().await?;

            match Self::update_in_tx(&mut tx, user, expected_updated_at).await {
                Ok(()) => {
                    tx.commit().await?;
                    Ok(())
                }
                Err(err) => {
                    if let Err(rollback) = tx.rollback().await {
                        tracing::warn!(user_id = %user.id, error = %rollback, "couldn't roll back update");
                    }
                    Err(err)
                }
            }
        })
        .await?
    }

    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<User> {
        let query = format!("{SELECT_USERS} WHERE id = $1");
        let row = ctx
            .run(
                sqlx::query_as::<_, DbUser>(&query)
                    .bind(id)
                    .fetch_optional(&self.pool),
            )
            .await??;

        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> StoreResult<()> {
        let result = ctx
            .run(
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(&self.pool),
            )
            .await??;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_all(&self, ctx: &RequestContext) -> StoreResult<Vec<User>> {
        let query = format!("{SELECT_USERS} ORDER BY id ASC");
        let rows = ctx
            .run(sqlx::query_as::<_, DbUser>(&query).fetch_all(&self.pool))
            .await??;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_by(
        &self,
        ctx: &RequestContext,
        field: UserField,
        value: &str,
    ) -> StoreResult<Vec<User>> {
        // `column()` comes from a fixed allowlist, never from input.
        let query = format!("{SELECT_USERS} WHERE {} = $1 ORDER BY id ASC", field.column());
        let rows = ctx
            .run(
                sqlx::query_as::<_, DbUser>(&query)
                    .bind(value)
                    .fetch_all(&self.pool),
            )
            .await??;

        Ok(rows.into_iter().map(User::from).collect())
    }
}

/// SQLSTATE 23505: unique_violation
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == "23505"),
        _ => false,
    }
}
