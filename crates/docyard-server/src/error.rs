//! HTTP error types for the `docyard` server.
//!
//! Maps [`ServiceError`] from `docyard-core` into HTTP responses through its
//! [`ErrorKind`]. Every response carries a JSON body with a machine-readable
//! `error` field and a human-readable `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use docyard_core::{ErrorKind, ServiceError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Service { kind: ErrorKind, message: String },

    /// The request does not address a hosted project.
    #[error("{0}")]
    NoSite(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        Self::Service {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::StorageIo | ErrorKind::Transaction | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            Self::Service { kind, message } => {
                let status = status_for(kind);
                if status.is_server_error() {
                    tracing::error!(kind = %kind, error = %message, "request failed");
                    (status, kind.to_string(), "internal server error".to_owned())
                } else {
                    (status, kind.to_string(), message)
                }
            }
            Self::NoSite(message) => (StatusCode::NOT_FOUND, "not_found".to_owned(), message),
        };

        (status, axum::Json(ErrorBody { error, message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use docyard_core::AuthError;
    use docyard_core::error::ValidationError;
    use docyard_core::StoreError;

    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (
                ServiceError::from(AuthError::InvalidCredentials),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ServiceError::from(AuthError::Forbidden {
                    reason: "not yours".to_owned(),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                ServiceError::from(StoreError::from(ValidationError::TitleTooShort { min: 2 })),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::from(StoreError::Conflict {
                    entity: "project",
                    key: "docs-a".to_owned(),
                }),
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::Cleanup {
                    titles: vec!["docs-a".to_owned()],
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn no_site_is_not_found() {
        let response = AppError::NoSite("no project in host".to_owned()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
