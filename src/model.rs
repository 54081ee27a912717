//! # User Model
//!
//! The stored user record and the caller-supplied input shape.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Finest timestamp resolution the stores keep, in nanoseconds (1µs).
pub const TIMESTAMP_RESOLUTION_NANOS: u32 = 1_000;

/// Drop any precision finer than a microsecond.
///
/// Timestamps must be truncated before they are stored or compared, otherwise a
/// caller echoing back a nanosecond value would never match the stored row.
pub fn truncate_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond();
    ts.with_nanosecond(nanos - nanos % TIMESTAMP_RESOLUTION_NANOS)
        .unwrap_or(ts)
}

/// User record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier, assigned by the service and never changed
    pub id: String,

    /// When the user was created
    pub created_at: DateTime<Utc>,

    /// When the user was last modified; strictly increases on every update
    pub updated_at: DateTime<Utc>,

    pub first_name: String,
    pub last_name: String,

    /// Display name
    pub name: String,

    pub email: String,

    /// ISO 3166-1 alpha-2 country code
    pub country: String,

    /// Argon2id password hash (never plaintext)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_hash: String,
}

/// User data as supplied by a caller.
///
/// Service-owned fields are optional so the validation layer can reject
/// requests that try to set them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub country: String,
    /// Clear-text password, only ever held in memory
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_hash: Option<String>,
}

/// Fields that can be used to filter user listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Country,
    Email,
}

impl UserField {
    /// Column name in the persisted layout
    pub fn column(&self) -> &'static str {
        match self {
            UserField::Country => "country",
            UserField::Email => "email",
        }
    }

    /// Read this field from a user
    pub fn value_of<'a>(&self, user: &'a User) -> &'a str {
        match self {
            UserField::Country => &user.country,
            UserField::Email => &user.email,
        }
    }
}

impl std::fmt::Display for UserField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}
