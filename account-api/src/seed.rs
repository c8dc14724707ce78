//! Seed accounts loaded from a TOML file at startup.
//!
//! ## Seed file format
//!
//! ```toml
//! [[users]]
//! email = "ada@example.com"
//! password = "secret"
//! first_name = "Ada"
//! last_name = "Lovelace"
//!
//! [[users]]
//! email = "grace@example.com"
//! password = "hunter2"
//! preferable_activity = "cycling"
//! target = "200km"
//! ```
//!
//! Every entry goes through the same signup validation as `POST /register`.
//! Invalid or duplicate entries are skipped with a warning; a file with no
//! usable entries is rejected.
//!
//! **Security:** the file holds plaintext passwords. Use `chmod 600`; the
//! server warns if it is world-readable (Unix).

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::user::{NewUser, ServiceError, UserService};
use crate::validation::{validate_signup, SignupFields};

#[derive(Debug, Error)]
pub enum SeedFileError {
    #[error("failed to read seed file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid seed file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("seed file {path} does not define any valid users")]
    EmptyUsers { path: String },
    #[error("failed to create seed user: {0}")]
    Service(#[from] ServiceError),
}

#[derive(Debug, Default, Deserialize)]
struct SeedFile {
    #[serde(default)]
    users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
struct SeedUser {
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
    preferable_activity: Option<String>,
    target: Option<String>,
}

impl SeedUser {
    fn fields(&self) -> SignupFields<'_> {
        SignupFields {
            email: Some(&self.email),
            password: Some(&self.password),
            first_name: self.first_name.as_deref(),
            last_name: self.last_name.as_deref(),
            preferable_activity: self.preferable_activity.as_deref(),
            target: self.target.as_deref(),
        }
    }

    fn into_new_user(self) -> NewUser {
        NewUser {
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            preferable_activity: self.preferable_activity,
            target: self.target,
        }
    }
}

/// Load the seed file and register its users. Returns how many were created.
pub async fn seed_users(path: &Path, service: &dyn UserService) -> Result<usize, SeedFileError> {
    check_seed_file_permissions(path);
    let users = read_seed_file(path)?;

    let mut created = 0;
    for user in users {
        let validation = validate_signup(&user.fields());
        if !validation.is_valid {
            warn!(
                email = %user.email,
                errors = ?validation.errors,
                "skipping invalid seed user"
            );
            continue;
        }
        if service.email_exists(&user.email).await? {
            warn!(email = %user.email, "skipping duplicate seed user");
            continue;
        }
        match service.create_user(user.into_new_user()).await {
            Ok(_) => created += 1,
            Err(ServiceError::EmailTaken) => {
                warn!("skipping seed user whose email was taken concurrently");
            }
            Err(err) => return Err(err.into()),
        }
    }

    if created == 0 {
        return Err(SeedFileError::EmptyUsers {
            path: path.display().to_string(),
        });
    }
    Ok(created)
}

fn read_seed_file(path: &Path) -> Result<Vec<SeedUser>, SeedFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SeedFileError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let parsed: SeedFile = toml::from_str(&raw).map_err(|source| SeedFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    Ok(parsed.users)
}

/// Warn if the seed file is world-readable. No-op on non-Unix.
#[cfg(unix)]
fn check_seed_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o004 != 0 {
            warn!(
                path = %path.display(),
                "seed file is world-readable; consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_seed_file_permissions(_path: &Path) {}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{seed_users, SeedFileError};
    use crate::store::InMemoryUserService;
    use crate::user::UserService;

    #[tokio::test]
    async fn seed_file_registers_valid_users() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("seed.toml");
        std::fs::write(
            &path,
            "[[users]]\nemail = \"ada@example.com\"\npassword = \"pw1\"\nfirst_name = \"Ada\"\n\n[[users]]\nemail = \"grace@example.com\"\npassword = \"pw2\"\n",
        )?;

        let service = InMemoryUserService::new();
        let created = seed_users(&path, &service).await?;

        assert_eq!(created, 2);
        assert!(service.email_exists("ada@example.com").await?);
        assert!(service.email_exists("grace@example.com").await?);
        Ok(())
    }

    #[tokio::test]
    async fn seed_file_skips_invalid_and_duplicate_entries() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("seed.toml");
        std::fs::write(
            &path,
            "[[users]]\nemail = \"a@b.com\"\npassword = \"pw\"\n\n[[users]]\nemail = \"A@B.com\"\npassword = \"pw\"\n\n[[users]]\nemail = \"not-an-email\"\npassword = \"pw\"\n",
        )?;

        let service = InMemoryUserService::new();
        let created = seed_users(&path, &service).await?;

        assert_eq!(created, 1);
        assert_eq!(service.user_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_seed_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seed.toml");
        std::fs::write(&path, "").unwrap();

        let result = seed_users(&path, &InMemoryUserService::new()).await;
        assert!(matches!(result, Err(SeedFileError::EmptyUsers { .. })));
    }

    #[tokio::test]
    async fn malformed_seed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seed.toml");
        std::fs::write(&path, "[[users]]\nemail = 3\n").unwrap();

        let result = seed_users(&path, &InMemoryUserService::new()).await;
        assert!(matches!(result, Err(SeedFileError::Parse { .. })));
    }

    #[tokio::test]
    async fn missing_seed_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let result = seed_users(&path, &InMemoryUserService::new()).await;
        assert!(matches!(result, Err(SeedFileError::Read { .. })));
    }
}
