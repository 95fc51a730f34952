//! Authorization gate.
//!
//! Resolves a requester from a username/password pair and decides what that
//! requester may touch:
//!
//! - a non-admin may act only on their own account and on project titles
//!   they own or that are still free;
//! - an admin may act on any account or project;
//! - only an admin may set an admin flag.
//!
//! Unknown usernames and wrong passwords produce the same
//! [`AuthError::InvalidCredentials`].

use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::credential::spawn_verify_password;
use crate::error::AuthError;
use crate::models::Account;
use crate::store::DocStore;

/// A username/password pair taken from the transport layer.
pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Authentication and authorization decisions over a [`DocStore`].
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn DocStore>,
}

impl AuthGate {
    #[must_use]
    pub fn new(store: Arc<dyn DocStore>) -> Self {
        Self { store }
    }

    /// Resolve the requester.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingCredentials`] when `credentials` is `None`.
    /// - [`AuthError::InvalidCredentials`] for an unknown username or a wrong
    ///   password.
    /// - [`AuthError::Store`] if the lookup itself fails.
    pub async fn authenticate(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Account, AuthError> {
        let credentials = credentials.ok_or(AuthError::MissingCredentials)?;

        let account = match self.store.fetch_account(&credentials.username).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                debug!(username = %credentials.username, "unknown username");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let verified = spawn_verify_password(
            account.password_hash.clone(),
            credentials.password.clone(),
        )
        .await;
        if !verified {
            debug!(username = %credentials.username, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(account)
    }

    /// Self-or-admin rule for account mutations.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when a non-admin targets another
    /// account.
    pub fn authorize_account(&self, requester: &Account, target_id: i32) -> Result<(), AuthError> {
        if requester.is_admin || requester.id == target_id {
            return Ok(());
        }
        Err(AuthError::Forbidden {
            reason: format!(
                "account '{}' may not modify account {target_id}",
                requester.username
            ),
        })
    }

    /// Ownership rule for project mutations. Admins bypass it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when `title` belongs to another
    /// account, or [`AuthError::Store`] if the ownership query fails.
    pub async fn authorize_project(
        &self,
        requester: &Account,
        title: &str,
    ) -> Result<(), AuthError> {
        if requester.is_admin {
            return Ok(());
        }
        if self.store.can_own_project(requester.id, title).await? {
            return Ok(());
        }
        Err(AuthError::Forbidden {
            reason: format!(
                "project '{title}' is owned by another account than '{}'",
                requester.username
            ),
        })
    }

    /// The admin flag to persist for a payload sent by `requester`.
    ///
    /// Admins get what they asked for. Anyone else gets `current`: `false` for
    /// a new account, the stored flag for an update.
    #[must_use]
    pub fn effective_admin_flag(
        requester: Option<&Account>,
        requested: bool,
        current: bool,
    ) -> bool {
        match requester {
            Some(account) if account.is_admin => requested,
            _ => current,
        }
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}
