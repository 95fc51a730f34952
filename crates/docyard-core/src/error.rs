//! Error types for `docyard-core`.
//!
//! Each layer has its own error enum. Variants carry the operation and key
//! (username or title) they failed on. Passwords and hashes never appear in
//! an error message.
//!
//! [`ServiceError::kind`] flattens the nested enums into the [`ErrorKind`]
//! taxonomy that a transport layer maps to status codes.

use docyard_storage::StorageError;

/// Input that breaks an account or project rule. Raised before any write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Username shorter than the minimum.
    #[error("username must have {min} characters or more")]
    UsernameTooShort { min: usize },

    /// Password shorter than the minimum.
    #[error("password must have {min} characters or more")]
    PasswordTooShort { min: usize },

    /// Field longer than its column allows.
    #[error("{field} must have at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// Project title shorter than the minimum.
    #[error("project title must have {min} characters or more")]
    TitleTooShort { min: usize },

    /// Project title cannot be used as a directory name.
    #[error("project title '{title}' is not allowed: {reason}")]
    UnsafeTitle { title: String, reason: &'static str },

    /// Identifier that can never match a row.
    #[error("invalid account id: {id}")]
    InvalidAccountId { id: i32 },

    /// A foreign key or check constraint rejected the row.
    #[error("rejected by constraint '{constraint}'")]
    Constraint { constraint: String },
}

/// Errors from password hashing.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The hashing primitive rejected its input or parameters.
    #[error("could not hash password: {reason}")]
    Hash { reason: String },

    /// The blocking hashing task panicked or was cancelled.
    #[error("password hashing task failed: {reason}")]
    Task { reason: String },
}

/// Errors from account and project persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Input rejected before touching the database.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A uniqueness rule was violated (username or project title taken).
    #[error("{entity} '{key}' already exists")]
    Conflict { entity: &'static str, key: String },

    /// The referenced row does not exist.
    #[error("no {entity} with {key}")]
    NotFound { entity: &'static str, key: String },

    /// Beginning or committing the transaction failed.
    #[error("transaction for {op} failed: {reason}")]
    Transaction { op: &'static str, reason: String },

    /// Any other database failure.
    #[error("database error during {op}: {reason}")]
    Database { op: &'static str, reason: String },

    /// Password hashing failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl StoreError {
    pub(crate) fn account_not_found(username: &str) -> Self {
        Self::NotFound {
            entity: "account",
            key: format!("username '{username}'"),
        }
    }

    pub(crate) fn project_not_found(title: &str) -> Self {
        Self::NotFound {
            entity: "project",
            key: format!("title '{title}'"),
        }
    }

    /// Map a driver error, keeping the operation and key in the message.
    ///
    /// Unique violations become `Conflict`, foreign key and check violations
    /// become `Validation`, a missing row becomes `NotFound`.
    #[cfg(feature = "postgres")]
    pub(crate) fn from_sqlx(op: &'static str, key: &str, err: sqlx::Error) -> Self {
        let sqlx::Error::Database(db_err) = &err else {
            if matches!(err, sqlx::Error::RowNotFound) {
                return Self::NotFound {
                    entity: "row",
                    key: key.to_owned(),
                };
            }
            return Self::Database {
                op,
                reason: err.to_string(),
            };
        };

        let constraint = db_err.constraint().unwrap_or_default().to_owned();
        match db_err.code().as_deref() {
            Some("23505") => Self::Conflict {
                entity: if constraint.starts_with("project") {
                    "project"
                } else {
                    "account"
                },
                key: key.to_owned(),
            },
            Some("23503" | "23514") => ValidationError::Constraint { constraint }.into(),
            _ => Self::Database {
                op,
                reason: db_err.to_string(),
            },
        }
    }

    /// Whether this is a [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors from the authorization gate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request carried no credentials.
    #[error("authentication not set in request")]
    MissingCredentials,

    /// Unknown username or wrong password. Deliberately indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Authenticated, but not allowed to perform the operation.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The store failed while resolving identity or ownership.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error taxonomy exposed to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Authentication,
    Authorization,
    NotFound,
    StorageIo,
    Transaction,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::NotFound => write!(f, "not_found"),
            Self::StorageIo => write!(f, "storage_io"),
            Self::Transaction => write!(f, "transaction"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Errors from [`DocService`](crate::service::DocService) operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Static file failure for the named project.
    #[error("static files for '{title}': {source}")]
    Files {
        title: String,
        #[source]
        source: StorageError,
    },

    /// Several artifacts could not be removed after an account delete.
    #[error("could not remove static files for {}", .titles.join(", "))]
    Cleanup { titles: Vec<String> },

    /// A blocking filesystem task panicked or was cancelled.
    #[error("background task failed: {reason}")]
    Task { reason: String },
}

impl ServiceError {
    /// Classify this error for the transport layer.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(err) => match err {
                AuthError::MissingCredentials | AuthError::InvalidCredentials => {
                    ErrorKind::Authentication
                }
                AuthError::Forbidden { .. } => ErrorKind::Authorization,
                AuthError::Store(inner) => store_kind(inner),
            },
            Self::Store(err) => store_kind(err),
            Self::Files { source, .. } => match source {
                StorageError::InvalidName { .. } => ErrorKind::Validation,
                StorageError::Archive { .. } | StorageError::Io { .. } => ErrorKind::StorageIo,
            },
            Self::Cleanup { .. } => ErrorKind::StorageIo,
            Self::Task { .. } => ErrorKind::Internal,
        }
    }
}

fn store_kind(err: &StoreError) -> ErrorKind {
    match err {
        StoreError::Validation(_) => ErrorKind::Validation,
        StoreError::Conflict { .. } => ErrorKind::Conflict,
        StoreError::NotFound { .. } => ErrorKind::NotFound,
        StoreError::Transaction { .. } => ErrorKind::Transaction,
        StoreError::Database { .. } | StoreError::Credential(_) => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_authorization() {
        let err = ServiceError::from(AuthError::Forbidden {
            reason: "not yours".to_owned(),
        });
        assert_eq!(err.kind(), ErrorKind::Authorization);
    }

    #[test]
    fn invalid_credentials_is_authentication() {
        assert_eq!(
            ServiceError::from(AuthError::InvalidCredentials).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ServiceError::from(AuthError::MissingCredentials).kind(),
            ErrorKind::Authentication
        );
    }

    #[test]
    fn store_errors_keep_their_kind_through_the_gate() {
        let conflict = StoreError::Conflict {
            entity: "project",
            key: "docs-a".to_owned(),
        };
        assert_eq!(
            ServiceError::from(AuthError::Store(conflict)).kind(),
            ErrorKind::Conflict
        );

        let validation = StoreError::from(ValidationError::TitleTooShort { min: 2 });
        assert_eq!(ServiceError::from(validation).kind(), ErrorKind::Validation);
    }

    #[test]
    fn file_errors_name_the_project() {
        let err = ServiceError::Files {
            title: "docs-a".to_owned(),
            source: StorageError::Io {
                path: "/srv/docs/docs-a".to_owned(),
                reason: "permission denied".to_owned(),
            },
        };
        assert_eq!(err.kind(), ErrorKind::StorageIo);
        assert!(err.to_string().contains("docs-a"));
    }

    #[test]
    fn cleanup_lists_every_title() {
        let err = ServiceError::Cleanup {
            titles: vec!["a-docs".to_owned(), "b-docs".to_owned()],
        };
        assert_eq!(
            err.to_string(),
            "could not remove static files for a-docs, b-docs"
        );
    }
}
