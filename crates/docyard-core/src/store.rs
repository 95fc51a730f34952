//! Persistence trait for accounts and projects.
//!
//! Implementations: [`PostgresStore`](crate::postgres::PostgresStore) for
//! production and [`MemoryStore`](crate::memory::MemoryStore) for tests and
//! local runs. Both enforce the same rules:
//!
//! - usernames and project titles are globally unique;
//! - the first account ever created is an admin;
//! - deleting an account deletes its projects in the same unit of work;
//! - updates and deletes that match no row return `NotFound`.
//!
//! Authorization is not checked here; see [`AuthGate`](crate::auth::AuthGate).

use async_trait::async_trait;

use crate::credential::NewAccount;
use crate::error::StoreError;
use crate::models::{Account, AccountUpdate, Project};

/// Account and project persistence.
#[async_trait]
pub trait DocStore: Send + Sync + 'static {
    /// Validate, hash, and insert a new account.
    ///
    /// The first account in an empty store is created as admin whatever
    /// `account.is_admin` says.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `Conflict` if the username is taken.
    async fn create_account(&self, account: &NewAccount) -> Result<Account, StoreError>;

    /// # Errors
    ///
    /// `NotFound` if no account has this username.
    async fn fetch_account(&self, username: &str) -> Result<Account, StoreError>;

    /// All accounts, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    async fn fetch_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Replace username, password, and admin flag of the account `update.id`.
    ///
    /// # Errors
    ///
    /// `Validation` for bad input, `Conflict` if the new username is taken,
    /// `NotFound` if the id matches nothing.
    async fn update_account(&self, update: &AccountUpdate) -> Result<Account, StoreError>;

    /// Delete an account and its projects.
    ///
    /// The returned account has `projects` filled with the rows that were
    /// deleted alongside it.
    ///
    /// # Errors
    ///
    /// `NotFound` if no account has this username.
    async fn delete_account(&self, username: &str) -> Result<Account, StoreError>;

    /// # Errors
    ///
    /// `NotFound` if no project has this title.
    async fn fetch_project(&self, title: &str) -> Result<Project, StoreError>;

    /// All projects, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    async fn fetch_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Projects owned by `account_id`, ordered by id. Empty for unknown ids.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    async fn fetch_projects_by_account(
        &self,
        account_id: i32,
    ) -> Result<Vec<Project>, StoreError>;

    /// Whether `account_id` may claim or modify `title`: true if the title is
    /// free or already owned by `account_id`.
    ///
    /// # Errors
    ///
    /// Returns a store error if the query fails.
    async fn can_own_project(&self, account_id: i32, title: &str) -> Result<bool, StoreError>;

    /// Create the project `(account_id, title)` or, if that pair exists,
    /// refresh its timestamp.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad title, `Conflict` if another account owns it,
    /// `Validation` if `account_id` does not exist.
    async fn create_or_update_project(
        &self,
        account_id: i32,
        title: &str,
    ) -> Result<Project, StoreError>;

    /// Delete the project row. Does not touch the filesystem.
    ///
    /// # Errors
    ///
    /// `NotFound` if no project has this title.
    async fn delete_project(&self, title: &str) -> Result<(), StoreError>;
}
