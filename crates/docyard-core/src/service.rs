//! Coordinator pairing relational writes with static file writes.
//!
//! Each operation authenticates the requester, checks the relevant rule,
//! writes the relational record, then touches the filesystem. The two stores
//! are not atomic with each other: the row is written first because it is
//! the authoritative existence record, and a filesystem failure afterwards is
//! logged and returned without undoing the row. Re-uploading or deleting the
//! same title repairs the mismatch, since [`StaticFiles::remove`] is
//! idempotent.
//!
//! Uploads and deletes of the same title are serialized within this process
//! by a per-title lock. Separate processes sharing a static root can still
//! interleave.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::Arc;

use docyard_storage::{StaticFiles, StorageError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::auth::{AuthGate, Credentials};
use crate::credential::{self, NewAccount};
use crate::error::{AuthError, ServiceError, StoreError};
use crate::models::{Account, AccountUpdate, Project};
use crate::store::DocStore;

#[derive(Debug, Default)]
struct TitleLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TitleLocks {
    async fn acquire(&self, title: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(title.to_owned()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Account and project operations over a store and a static root.
#[derive(Clone)]
pub struct DocService {
    store: Arc<dyn DocStore>,
    files: StaticFiles,
    gate: AuthGate,
    locks: Arc<TitleLocks>,
}

impl std::fmt::Debug for DocService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocService")
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

async fn blocking<T, F>(task: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ServiceError::Task {
            reason: e.to_string(),
        })
}

fn files_error(title: &str, source: StorageError) -> ServiceError {
    ServiceError::Files {
        title: title.to_owned(),
        source,
    }
}

impl DocService {
    #[must_use]
    pub fn new(store: Arc<dyn DocStore>, files: StaticFiles) -> Self {
        Self {
            gate: AuthGate::new(Arc::clone(&store)),
            store,
            files,
            locks: Arc::default(),
        }
    }

    #[must_use]
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    #[must_use]
    pub fn files(&self) -> &StaticFiles {
        &self.files
    }

    /// Create an account.
    ///
    /// Anonymous callers and non-admins always create non-admin accounts; the
    /// store still promotes the very first account. Supplied credentials
    /// must be valid.
    ///
    /// # Errors
    ///
    /// Authentication errors for bad supplied credentials, `Validation` or
    /// `Conflict` from the store.
    pub async fn register_account(
        &self,
        requester: Option<&Credentials>,
        mut account: NewAccount,
    ) -> Result<Account, ServiceError> {
        let requester = match requester {
            Some(credentials) => Some(self.gate.authenticate(Some(credentials)).await?),
            None => None,
        };

        account.is_admin =
            AuthGate::effective_admin_flag(requester.as_ref(), account.is_admin, false);

        let created = self.store.create_account(&account).await?;
        info!(username = %created.username, is_admin = created.is_admin, "account registered");
        Ok(created)
    }

    /// Replace an account's username, password, and (admins only) admin flag.
    ///
    /// # Errors
    ///
    /// Authentication errors, `Forbidden` unless self or admin, then store
    /// errors.
    pub async fn update_account(
        &self,
        requester: Option<&Credentials>,
        mut update: AccountUpdate,
    ) -> Result<Account, ServiceError> {
        let requester = self.gate.authenticate(requester).await?;
        self.gate.authorize_account(&requester, update.id)?;

        update.is_admin =
            AuthGate::effective_admin_flag(Some(&requester), update.is_admin, requester.is_admin);

        Ok(self.store.update_account(&update).await?)
    }

    /// Delete an account, its projects, and their static files.
    ///
    /// The relational delete commits first. Every artifact removal is then
    /// attempted; failures are logged one by one and reported together.
    ///
    /// # Errors
    ///
    /// Authentication errors, `Forbidden` unless self or admin, `NotFound`,
    /// or [`ServiceError::Cleanup`] naming the titles whose files remain.
    pub async fn delete_account(
        &self,
        requester: Option<&Credentials>,
        username: &str,
    ) -> Result<Account, ServiceError> {
        let requester = self.gate.authenticate(requester).await?;
        let target_id = if requester.username == username {
            requester.id
        } else {
            match self.store.fetch_account(username).await {
                Ok(target) => target.id,
                Err(e) if e.is_not_found() && !requester.is_admin => {
                    return Err(AuthError::Forbidden {
                        reason: format!(
                            "account '{}' may not delete other accounts",
                            requester.username
                        ),
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        };
        self.gate.authorize_account(&requester, target_id)?;

        let deleted = self.store.delete_account(username).await?;

        let mut failed = Vec::new();
        for project in &deleted.projects {
            let _guard = self.locks.acquire(&project.title).await;
            let files = self.files.clone();
            let title = project.title.clone();
            let removed = blocking(move || files.remove(&title)).await?;
            if let Err(e) = removed {
                warn!(title = %project.title, error = %e, "static files left behind");
                failed.push(project.title.clone());
            }
        }

        info!(
            username,
            projects = deleted.projects.len(),
            "account deleted"
        );
        if failed.is_empty() {
            Ok(deleted)
        } else {
            Err(ServiceError::Cleanup { titles: failed })
        }
    }

    /// Check a username/password pair.
    ///
    /// # Errors
    ///
    /// Authentication errors as for [`AuthGate::authenticate`].
    pub async fn validate_credentials(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Account, ServiceError> {
        Ok(self.gate.authenticate(credentials).await?)
    }

    /// All accounts. Admins only.
    ///
    /// # Errors
    ///
    /// Authentication errors or `Forbidden` for non-admins.
    pub async fn list_accounts(
        &self,
        requester: Option<&Credentials>,
    ) -> Result<Vec<Account>, ServiceError> {
        let requester = self.gate.authenticate(requester).await?;
        if !requester.is_admin {
            return Err(AuthError::Forbidden {
                reason: format!("account '{}' may not list accounts", requester.username),
            }
            .into());
        }
        Ok(self.store.fetch_accounts().await?)
    }

    /// Every project, or those of one account.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown username.
    pub async fn list_projects(
        &self,
        username: Option<&str>,
    ) -> Result<Vec<Project>, ServiceError> {
        let projects = match username {
            Some(username) => {
                let account = self.store.fetch_account(username).await?;
                self.store.fetch_projects_by_account(account.id).await?
            }
            None => self.store.fetch_projects().await?,
        };
        Ok(projects)
    }

    /// Record an upload of `title` and unpack `archive` as its content.
    ///
    /// A free title is claimed by the requester. An admin uploading a title
    /// owned by someone else refreshes it on behalf of that owner.
    ///
    /// # Errors
    ///
    /// - authentication errors, or `Forbidden` when the title is owned by
    ///   another account; nothing is written in either case;
    /// - `Validation` for an unusable title;
    /// - [`ServiceError::Files`] if extraction fails after the row was
    ///   written.
    pub async fn upload_project<R>(
        &self,
        requester: Option<&Credentials>,
        title: &str,
        archive: R,
        size_hint: u64,
    ) -> Result<Project, ServiceError>
    where
        R: Read + Seek + Send + 'static,
    {
        let requester = self.gate.authenticate(requester).await?;
        credential::validate_title(title).map_err(StoreError::from)?;
        self.gate.authorize_project(&requester, title).await?;

        let _guard = self.locks.acquire(title).await;

        let owner_id = match self.store.fetch_project(title).await {
            Ok(existing) if requester.is_admin => existing.account_id,
            Ok(_) => requester.id,
            Err(e) if e.is_not_found() => requester.id,
            Err(e) => return Err(e.into()),
        };
        let project = self.store.create_or_update_project(owner_id, title).await?;

        let files = self.files.clone();
        let name = title.to_owned();
        let extracted = blocking(move || files.upload(archive, &name, size_hint)).await?;
        if let Err(e) = extracted {
            warn!(title, error = %e, "project recorded but static files not written");
            return Err(files_error(title, e));
        }

        info!(
            title,
            uploader = %requester.username,
            owner_id,
            "project uploaded"
        );
        Ok(project)
    }

    /// Delete the project `title` and its static files.
    ///
    /// # Errors
    ///
    /// Authentication errors, `Forbidden` when owned by another account,
    /// `NotFound`, or [`ServiceError::Files`] if the files could not be
    /// removed after the row was deleted.
    pub async fn delete_project(
        &self,
        requester: Option<&Credentials>,
        title: &str,
    ) -> Result<(), ServiceError> {
        let requester = self.gate.authenticate(requester).await?;
        self.gate.authorize_project(&requester, title).await?;

        let _guard = self.locks.acquire(title).await;
        self.store.delete_project(title).await?;

        let files = self.files.clone();
        let name = title.to_owned();
        let removed = blocking(move || files.remove(&name)).await?;
        if let Err(e) = removed {
            warn!(title, error = %e, "project deleted but static files remain");
            return Err(files_error(title, e));
        }

        info!(title, requester = %requester.username, "project removed");
        Ok(())
    }
}
