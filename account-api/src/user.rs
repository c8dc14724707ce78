//! User domain types and the service contract the HTTP layer depends on.
//!
//! Controllers never touch storage or password hashes directly; they call a
//! [`UserService`]. The service owns persistence, hashing, and email uniqueness.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Opaque user identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Parse a raw id, rejecting empty or whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user as seen by controllers. The password hash stays inside the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferable_activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input. `password` is plaintext; the service hashes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub preferable_activity: Option<String>,
    pub target: Option<String>,
}

/// Profile update forwarded to the service.
///
/// `preferable_activity` and `target` are `None` when the caller did not
/// supply them, and the service leaves the stored values alone in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPatch {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub preferable_activity: Option<String>,
    pub target: Option<String>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("User not found")]
    UserNotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

#[async_trait]
pub trait UserService: Send + Sync {
    async fn email_exists(&self, email: &str) -> Result<bool, ServiceError>;

    /// Fails with [`ServiceError::EmailTaken`] if the email was claimed concurrently.
    async fn create_user(&self, new_user: NewUser) -> Result<User, ServiceError>;

    async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>, ServiceError>;

    async fn update_user(&self, patch: UserPatch) -> Result<User, ServiceError>;

    /// Returns `false` for unknown users as well as wrong passwords.
    async fn verify_password(&self, id: &UserId, password: &str) -> Result<bool, ServiceError>;

    async fn update_password(&self, id: &UserId, new_password: &str) -> Result<(), ServiceError>;
}

/// Trim and lowercase an email for comparison and indexing.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{normalize_email, UserId};

    #[test]
    fn user_id_rejects_blank_input() {
        assert!(UserId::parse("").is_none());
        assert!(UserId::parse("   ").is_none());
    }

    #[test]
    fn user_id_trims_surrounding_whitespace() {
        let id = UserId::parse("  abc-123 ").map(|id| id.to_string());
        assert_eq!(id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(UserId::generate(), UserId::generate());
    }

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
