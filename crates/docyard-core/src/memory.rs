//! In-memory store for tests and local runs.
//!
//! All rows live in `BTreeMap`s behind one `RwLock`, so every operation is
//! atomic with respect to the others. Nothing is persisted.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::credential::{self, NewAccount};
use crate::error::{StoreError, ValidationError};
use crate::models::{Account, AccountUpdate, Project};
use crate::store::DocStore;

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<i32, Account>,
    projects: BTreeMap<i32, Project>,
    last_account_id: i32,
    last_project_id: i32,
}

impl State {
    fn account_by_name(&self, username: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.username == username)
    }

    fn project_by_title(&self, title: &str) -> Option<&Project> {
        self.projects.values().find(|p| p.title == title)
    }

    fn projects_of(&self, account_id: i32) -> Vec<Project> {
        self.projects
            .values()
            .filter(|p| p.account_id == account_id)
            .cloned()
            .collect()
    }
}

/// A [`DocStore`] held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn username_taken(username: &str) -> StoreError {
    StoreError::Conflict {
        entity: "account",
        key: username.to_owned(),
    }
}

#[async_trait]
impl DocStore for MemoryStore {
    async fn create_account(&self, account: &NewAccount) -> Result<Account, StoreError> {
        let prepared = account.prepare().await?;

        let mut state = self.state.write().await;
        if state.account_by_name(&prepared.username).is_some() {
            return Err(username_taken(&prepared.username));
        }

        let is_admin = prepared.is_admin || state.accounts.is_empty();
        state.last_account_id += 1;
        let created = Account {
            id: state.last_account_id,
            username: prepared.username,
            password_hash: prepared.password_hash,
            is_admin,
            projects: Vec::new(),
        };
        state.accounts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn fetch_account(&self, username: &str) -> Result<Account, StoreError> {
        let state = self.state.read().await;
        state
            .account_by_name(username)
            .cloned()
            .ok_or_else(|| StoreError::account_not_found(username))
    }

    async fn fetch_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let state = self.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }

    async fn update_account(&self, update: &AccountUpdate) -> Result<Account, StoreError> {
        credential::validate_username(&update.username)?;
        credential::validate_password(&update.password)?;
        let password = update.password.clone();
        let password_hash = credential::spawn_hash_password(password).await?;

        let mut state = self.state.write().await;
        if let Some(other) = state.account_by_name(&update.username) {
            if other.id != update.id {
                return Err(username_taken(&update.username));
            }
        }

        let account = state
            .accounts
            .get_mut(&update.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                key: format!("id {}", update.id),
            })?;
        account.username.clone_from(&update.username);
        account.password_hash = password_hash;
        account.is_admin = update.is_admin;

        Ok(account.clone())
    }

    async fn delete_account(&self, username: &str) -> Result<Account, StoreError> {
        let mut state = self.state.write().await;
        let id = state
            .account_by_name(username)
            .map(|a| a.id)
            .ok_or_else(|| StoreError::account_not_found(username))?;

        let projects = state.projects_of(id);
        state.projects.retain(|_, p| p.account_id != id);

        let mut deleted = state
            .accounts
            .remove(&id)
            .ok_or_else(|| StoreError::account_not_found(username))?;
        deleted.projects = projects;

        Ok(deleted)
    }

    async fn fetch_project(&self, title: &str) -> Result<Project, StoreError> {
        let state = self.state.read().await;
        state
            .project_by_title(title)
            .cloned()
            .ok_or_else(|| StoreError::project_not_found(title))
    }

    async fn fetch_projects(&self) -> Result<Vec<Project>, StoreError> {
        let state = self.state.read().await;
        Ok(state.projects.values().cloned().collect())
    }

    async fn fetch_projects_by_account(
        &self,
        account_id: i32,
    ) -> Result<Vec<Project>, StoreError> {
        let state = self.state.read().await;
        Ok(state.projects_of(account_id))
    }

    async fn can_own_project(&self, account_id: i32, title: &str) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .project_by_title(title)
            .is_none_or(|p| p.account_id == account_id))
    }

    async fn create_or_update_project(
        &self,
        account_id: i32,
        title: &str,
    ) -> Result<Project, StoreError> {
        credential::validate_title(title)?;

        let mut state = self.state.write().await;
        if !state.accounts.contains_key(&account_id) {
            return Err(ValidationError::InvalidAccountId { id: account_id }.into());
        }

        let existing = state.project_by_title(title).map(|p| (p.id, p.account_id));
        match existing {
            Some((id, owner)) if owner == account_id => {
                let project = state
                    .projects
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::project_not_found(title))?;
                project.last_update = Utc::now();
                Ok(project.clone())
            }
            Some(_) => Err(StoreError::Conflict {
                entity: "project",
                key: title.to_owned(),
            }),
            None => {
                state.last_project_id += 1;
                let project = Project {
                    id: state.last_project_id,
                    title: title.to_owned(),
                    last_update: Utc::now(),
                    account_id,
                };
                state.projects.insert(project.id, project.clone());
                Ok(project)
            }
        }
    }

    async fn delete_project(&self, title: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let id = state
            .project_by_title(title)
            .map(|p| p.id)
            .ok_or_else(|| StoreError::project_not_found(title))?;
        state.projects.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credential::verify_password;

    async fn seeded() -> (MemoryStore, Account, Account) {
        let store = MemoryStore::new();
        let admin = store
            .create_account(&NewAccount::new("admin", "admin-pass", false))
            .await
            .unwrap();
        let alice = store
            .create_account(&NewAccount::new("alice", "alice-pass", false))
            .await
            .unwrap();
        (store, admin, alice)
    }

    #[tokio::test]
    async fn created_account_verifies_original_password() {
        let (store, _, _) = seeded().await;
        let fetched = store.fetch_account("alice").await.unwrap();
        assert!(verify_password(&fetched.password_hash, "alice-pass"));
        assert!(!verify_password(&fetched.password_hash, "wrong-pass"));
    }

    #[tokio::test]
    async fn first_account_is_admin() {
        let (_, admin, alice) = seeded().await;
        assert!(admin.is_admin);
        assert!(!alice.is_admin);
    }

    #[tokio::test]
    async fn duplicate_username_conflicts_and_keeps_original() {
        let (store, _, alice) = seeded().await;
        let err = store
            .create_account(&NewAccount::new("alice", "other-pass", true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "account", .. }));

        let fetched = store.fetch_account("alice").await.unwrap();
        assert_eq!(fetched.id, alice.id);
        assert!(!fetched.is_admin);
        assert!(verify_password(&fetched.password_hash, "alice-pass"));
    }

    #[tokio::test]
    async fn short_credentials_are_rejected() {
        let store = MemoryStore::new();
        let err = store
            .create_account(&NewAccount::new("bob", "long-enough", false))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(store.fetch_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_missing_account_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.fetch_account("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_rehashes_password() {
        let (store, _, alice) = seeded().await;
        let updated = store
            .update_account(&AccountUpdate::new(alice.id, "alice2", "new-pass", false))
            .await
            .unwrap();
        assert_eq!(updated.username, "alice2");
        assert!(verify_password(&updated.password_hash, "new-pass"));
        assert!(store.fetch_account("alice").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn update_rejects_taken_username_and_unknown_id() {
        let (store, _, alice) = seeded().await;
        let err = store
            .update_account(&AccountUpdate::new(alice.id, "admin", "new-pass", false))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let err = store
            .update_account(&AccountUpdate::new(99, "nobody", "new-pass", false))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn can_own_free_and_own_titles_only() {
        let (store, admin, alice) = seeded().await;
        assert!(store.can_own_project(alice.id, "docs-a").await.unwrap());

        store.create_or_update_project(alice.id, "docs-a").await.unwrap();
        assert!(store.can_own_project(alice.id, "docs-a").await.unwrap());
        assert!(!store.can_own_project(admin.id, "docs-a").await.unwrap());
    }

    #[tokio::test]
    async fn repeated_upsert_keeps_one_row() {
        let (store, _, alice) = seeded().await;
        let first = store.create_or_update_project(alice.id, "docs-a").await.unwrap();
        let second = store.create_or_update_project(alice.id, "docs-a").await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.last_update >= first.last_update);
        assert_eq!(store.fetch_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_of_foreign_title_conflicts() {
        let (store, admin, alice) = seeded().await;
        store.create_or_update_project(alice.id, "docs-a").await.unwrap();

        let err = store
            .create_or_update_project(admin.id, "docs-a")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "project", .. }));
        assert_eq!(store.fetch_project("docs-a").await.unwrap().account_id, alice.id);
    }

    #[tokio::test]
    async fn upsert_validates_title_and_owner() {
        let (store, _, alice) = seeded().await;
        let err = store.create_or_update_project(alice.id, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        let err = store.create_or_update_project(42, "docs-z").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::InvalidAccountId { id: 42 })
        ));
    }

    #[tokio::test]
    async fn delete_account_cascades_to_projects() {
        let (store, admin, alice) = seeded().await;
        store.create_or_update_project(alice.id, "docs-a").await.unwrap();
        store.create_or_update_project(alice.id, "docs-b").await.unwrap();
        store.create_or_update_project(admin.id, "admin-docs").await.unwrap();

        let deleted = store.delete_account("alice").await.unwrap();
        let titles: Vec<_> = deleted.projects.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["docs-a", "docs-b"]);

        assert!(store.fetch_projects_by_account(alice.id).await.unwrap().is_empty());
        assert!(store.fetch_project("docs-a").await.unwrap_err().is_not_found());
        assert_eq!(store.fetch_projects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_rows_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.delete_account("ghost").await.unwrap_err().is_not_found());
        assert!(store.delete_project("ghost").await.unwrap_err().is_not_found());
    }
}
