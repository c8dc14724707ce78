//! In-memory [`UserService`] backed by concurrent maps.
//!
//! Users live in a `DashMap` keyed by id, with a second map from normalized
//! email to id. Registration claims the email slot through the entry API, so
//! the uniqueness check and the insert cannot interleave with another request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::password::{self, PasswordError};
use crate::user::{normalize_email, NewUser, ServiceError, User, UserId, UserPatch, UserService};

#[derive(Debug, Clone)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserService {
    users: Arc<DashMap<UserId, StoredUser>>,
    emails: Arc<DashMap<String, UserId>>,
}

impl InMemoryUserService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn stored_hash(&self, id: &UserId) -> Option<String> {
        self.users
            .get(id)
            .map(|entry| entry.password_hash.clone())
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Hashing(err.to_string())
    }
}

async fn hash_blocking(plaintext: &str) -> Result<String, ServiceError> {
    let plaintext = plaintext.to_string();
    tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|join_err| {
            ServiceError::Storage(format!("blocking task failed: {join_err}"))
        })?
        .map_err(ServiceError::from)
}

async fn verify_blocking(plaintext: &str, stored_hash: String) -> Result<bool, ServiceError> {
    let plaintext = plaintext.to_string();
    tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &stored_hash))
        .await
        .map_err(|join_err| {
            ServiceError::Storage(format!("blocking task failed: {join_err}"))
        })?
        .map_err(ServiceError::from)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl UserService for InMemoryUserService {
    async fn email_exists(&self, email: &str) -> Result<bool, ServiceError> {
        Ok(self.emails.contains_key(&normalize_email(email)))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, ServiceError> {
        let password_hash = hash_blocking(&new_user.password).await?;
        let email = normalize_email(&new_user.email);
        let id = UserId::generate();

        match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => return Err(ServiceError::EmailTaken),
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let now = Utc::now();
        let user = User {
            id: id.clone(),
            email,
            first_name: non_empty(new_user.first_name),
            last_name: non_empty(new_user.last_name),
            preferable_activity: non_empty(new_user.preferable_activity),
            target: non_empty(new_user.target),
            created_at: now,
            updated_at: now,
        };
        self.users.insert(
            id,
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        debug!(user_id = %user.id, "user created");
        Ok(user)
    }

    async fn get_user_by_id(&self, id: &UserId) -> Result<Option<User>, ServiceError> {
        Ok(self.users.get(id).map(|entry| entry.user.clone()))
    }

    async fn update_user(&self, patch: UserPatch) -> Result<User, ServiceError> {
        let mut entry = self
            .users
            .get_mut(&patch.user_id)
            .ok_or(ServiceError::UserNotFound)?;
        let user = &mut entry.user;
        user.first_name = Some(patch.first_name);
        user.last_name = Some(patch.last_name);
        if let Some(activity) = patch.preferable_activity {
            user.preferable_activity = Some(activity);
        }
        if let Some(target) = patch.target {
            user.target = Some(target);
        }
        user.updated_at = Utc::now();
        debug!(user_id = %user.id, "user updated");
        Ok(user.clone())
    }

    async fn verify_password(&self, id: &UserId, password: &str) -> Result<bool, ServiceError> {
        let Some(stored_hash) = self.stored_hash(id) else {
            return Ok(false);
        };
        verify_blocking(password, stored_hash).await
    }

    async fn update_password(&self, id: &UserId, new_password: &str) -> Result<(), ServiceError> {
        if !self.users.contains_key(id) {
            return Err(ServiceError::UserNotFound);
        }
        let password_hash = hash_blocking(new_password).await?;
        let mut entry = self.users.get_mut(id).ok_or(ServiceError::UserNotFound)?;
        entry.password_hash = password_hash;
        entry.user.updated_at = Utc::now();
        debug!(user_id = %id, "password updated");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;

    use super::InMemoryUserService;
    use crate::user::{NewUser, ServiceError, UserId, UserPatch, UserService};

    fn new_user(email: &str, password: &str) -> NewUser {
        NewUser {
            email: String::from(email),
            password: String::from(password),
            first_name: Some(String::from("Ada")),
            last_name: Some(String::from("Lovelace")),
            preferable_activity: None,
            target: None,
        }
    }

    #[tokio::test]
    async fn create_then_lookup_round_trips_profile() -> Result<()> {
        let service = InMemoryUserService::new();
        let created = service.create_user(new_user("Ada@Example.com", "pw")).await?;

        assert_eq!(created.email, "ada@example.com");
        let fetched = service.get_user_by_id(&created.id).await?;
        assert_eq!(fetched.as_ref(), Some(&created));
        assert!(service.email_exists("ADA@example.com ").await?);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() -> Result<()> {
        let service = InMemoryUserService::new();
        service.create_user(new_user("a@b.com", "pw")).await?;

        let second = service.create_user(new_user("A@B.com", "other")).await;
        assert!(matches!(second, Err(ServiceError::EmailTaken)));
        assert_eq!(service.user_count(), 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_admit_exactly_one() -> Result<()> {
        let service = InMemoryUserService::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create_user(new_user("race@b.com", "pw")).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await?.is_ok() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(service.user_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_id_lookup_is_none() -> Result<()> {
        let service = InMemoryUserService::new();
        let missing = UserId::parse("missing").unwrap();
        assert!(service.get_user_by_id(&missing).await?.is_none());
        assert!(!service.verify_password(&missing, "pw").await?);
        Ok(())
    }

    #[tokio::test]
    async fn update_keeps_optional_fields_when_absent() -> Result<()> {
        let service = InMemoryUserService::new();
        let mut seed = new_user("a@b.com", "pw");
        seed.preferable_activity = Some(String::from("running"));
        let created = service.create_user(seed).await?;

        let updated = service
            .update_user(UserPatch {
                user_id: created.id.clone(),
                first_name: String::from("Grace"),
                last_name: String::from("Hopper"),
                preferable_activity: None,
                target: Some(String::from("10k")),
            })
            .await?;

        assert_eq!(updated.first_name.as_deref(), Some("Grace"));
        assert_eq!(updated.preferable_activity.as_deref(), Some("running"));
        assert_eq!(updated.target.as_deref(), Some("10k"));
        assert!(updated.updated_at >= created.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn update_unknown_user_fails_with_not_found() {
        let service = InMemoryUserService::new();
        let result = service
            .update_user(UserPatch {
                user_id: UserId::parse("ghost").unwrap(),
                first_name: String::from("A"),
                last_name: String::from("B"),
                preferable_activity: None,
                target: None,
            })
            .await;
        assert!(matches!(result, Err(ServiceError::UserNotFound)));
    }

    #[tokio::test]
    async fn password_update_replaces_old_credential() -> Result<()> {
        let service = InMemoryUserService::new();
        let created = service.create_user(new_user("a@b.com", "old-pw")).await?;

        assert!(service.verify_password(&created.id, "old-pw").await?);
        service.update_password(&created.id, "new-pw").await?;

        assert!(!service.verify_password(&created.id, "old-pw").await?);
        assert!(service.verify_password(&created.id, "new-pw").await?);
        Ok(())
    }

    #[tokio::test]
    async fn password_update_for_unknown_user_fails() {
        let service = InMemoryUserService::new();
        let ghost = UserId::parse("ghost").unwrap();
        let result = service.update_password(&ghost, "pw").await;
        assert!(matches!(result, Err(ServiceError::UserNotFound)));
    }
}
