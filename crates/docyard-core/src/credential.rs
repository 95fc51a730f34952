//! Credential model: validation rules and password hashing.
//!
//! Passwords are hashed with Argon2id and a fresh random salt per call. The
//! stored value is a PHC string, so parameters travel with the hash and
//! verification needs nothing else.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::warn;
use zeroize::Zeroizing;

use crate::error::{CredentialError, StoreError, ValidationError};

/// Minimum username length, in characters.
pub const MIN_USERNAME_LEN: usize = 4;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 4;

/// Minimum project title length, in characters.
pub const MIN_TITLE_LEN: usize = 2;

/// Maximum project title length: one DNS label.
pub const MAX_TITLE_LEN: usize = 63;

/// Width of the username column.
pub const MAX_NAME_LEN: usize = 255;

/// Check the username rules.
///
/// # Errors
///
/// Returns [`ValidationError`] if the username is too short or too long.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if len < MIN_USERNAME_LEN {
        return Err(ValidationError::UsernameTooShort {
            min: MIN_USERNAME_LEN,
        });
    }
    if len > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "username",
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Check the password rules.
///
/// # Errors
///
/// Returns [`ValidationError::PasswordTooShort`] below the minimum length.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Check that a project title can name both its directory under the static
/// root and the first label of the host it is served at.
///
/// Titles are lowercase ASCII letters, digits and inner hyphens. Host names
/// are case-insensitive, so uppercase is rejected rather than folded.
///
/// # Errors
///
/// Returns [`ValidationError`] describing the first rule broken.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let len = title.chars().count();
    if len < MIN_TITLE_LEN {
        return Err(ValidationError::TitleTooShort { min: MIN_TITLE_LEN });
    }
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: "project title",
            max: MAX_TITLE_LEN,
        });
    }

    let unsafe_title = |reason| ValidationError::UnsafeTitle {
        title: title.to_owned(),
        reason,
    };
    if !title
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(unsafe_title(
            "only lowercase ASCII letters, digits and '-' are allowed",
        ));
    }
    if title.starts_with('-') || title.ends_with('-') {
        return Err(unsafe_title("starts or ends with '-'"));
    }
    Ok(())
}

/// Hash `password` with Argon2id and a random salt.
///
/// # Errors
///
/// Returns [`CredentialError::Hash`] if the primitive rejects the input.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash {
            reason: e.to_string(),
        })
}

/// Check `candidate` against a stored PHC hash.
///
/// An unparseable stored hash never verifies.
#[must_use]
pub fn verify_password(stored_hash: &str, candidate: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            return false;
        }
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

async fn off_runtime<T, F>(task: F) -> Result<T, CredentialError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| CredentialError::Task {
            reason: e.to_string(),
        })
}

/// [`hash_password`] on the blocking thread pool.
///
/// # Errors
///
/// Returns [`CredentialError`] if hashing fails or the task is lost.
pub async fn spawn_hash_password(password: Zeroizing<String>) -> Result<String, CredentialError> {
    off_runtime(move || hash_password(&password)).await?
}

/// [`verify_password`] on the blocking thread pool. A lost task never
/// verifies.
pub async fn spawn_verify_password(stored_hash: String, candidate: Zeroizing<String>) -> bool {
    match off_runtime(move || verify_password(&stored_hash, &candidate)).await {
        Ok(verified) => verified,
        Err(e) => {
            warn!(error = %e, "password verification task failed");
            false
        }
    }
}

/// Account creation request as received from the caller.
pub struct NewAccount {
    pub username: String,
    pub password: Zeroizing<String>,
    pub is_admin: bool,
}

impl NewAccount {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>, is_admin: bool) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
            is_admin,
        }
    }

    /// Validate and hash, producing the row to insert.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] on a rule violation and
    /// [`StoreError::Credential`] if hashing fails.
    pub async fn prepare(&self) -> Result<PreparedAccount, StoreError> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        let password_hash = spawn_hash_password(self.password.clone()).await?;

        Ok(PreparedAccount {
            username: self.username.clone(),
            password_hash,
            is_admin: self.is_admin,
        })
    }
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// A validated account with its password already hashed.
#[derive(Clone)]
pub struct PreparedAccount {
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
}

impl std::fmt::Debug for PreparedAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedAccount")
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}
