//! Account and project records.
//!
//! Serialized forms never include the password hash: the field is skipped by
//! serde and redacted from `Debug`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::Zeroizing;

/// A system identity with credentials and an admin flag.
#[derive(Clone, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i32,
    pub username: String,
    #[serde(skip)]
    #[cfg_attr(feature = "postgres", sqlx(rename = "password"))]
    pub password_hash: String,
    pub is_admin: bool,
    /// Owned projects. Populated only by operations that say so.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[cfg_attr(feature = "postgres", sqlx(skip))]
    pub projects: Vec<Project>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .field("projects", &self.projects)
            .finish()
    }
}

/// A named, owned documentation site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i32,
    pub title: String,
    pub last_update: DateTime<Utc>,
    #[serde(skip)]
    pub account_id: i32,
}

/// Replacement values for an existing account.
///
/// The password is always re-hashed; callers that want to keep the current
/// password must send it again.
pub struct AccountUpdate {
    pub id: i32,
    pub username: String,
    pub password: Zeroizing<String>,
    pub is_admin: bool,
}

impl AccountUpdate {
    #[must_use]
    pub fn new(
        id: i32,
        username: impl Into<String>,
        password: impl Into<String>,
        is_admin: bool,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            password: Zeroizing::new(password.into()),
            is_admin,
        }
    }
}

impl std::fmt::Debug for AccountUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountUpdate")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account {
            id: 7,
            username: "alice".to_owned(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_owned(),
            is_admin: true,
            projects: Vec::new(),
        }
    }

    #[test]
    fn account_json_omits_password() {
        let json = serde_json::to_value(account()).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["isAdmin"], true);
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("projects").is_none());
    }

    #[test]
    fn account_json_lists_projects_when_loaded() {
        let mut account = account();
        account.projects.push(Project {
            id: 1,
            title: "docs-a".to_owned(),
            last_update: Utc::now(),
            account_id: 7,
        });

        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["projects"][0]["title"], "docs-a");
        assert!(json["projects"][0].get("lastUpdate").is_some());
        assert!(json["projects"][0].get("accountId").is_none());
    }

    #[test]
    fn debug_redacts_hash() {
        let account = account();
        assert!(!format!("{account:?}").contains("argon2"));

        let update = AccountUpdate::new(7, "alice", "new-secret", false);
        assert!(!format!("{update:?}").contains("new-secret"));
    }
}
