//! Per-project doc serving.
//!
//! A request to `<title>.<domain>/<path>` is answered from
//! `<static-root>/<title>/<path>`. Directory requests fall back to their
//! `index.html`.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::debug;

use docyard_core::credential::validate_title;

use crate::error::AppError;
use crate::state::AppState;

/// Project title addressed by a `Host` header value, if any.
///
/// The title is the first DNS label, lowercased; a bare host without a
/// domain addresses no project.
pub fn site_title(host: &str) -> Option<String> {
    let name = host.split(':').next()?;
    let (label, domain) = name.split_once('.')?;
    if label.is_empty() || domain.is_empty() {
        return None;
    }
    let title = label.to_ascii_lowercase();
    validate_title(&title).ok()?;
    Some(title)
}

/// Fallback handler serving static files for the project in the `Host`.
///
/// # Errors
///
/// Returns [`AppError::NoSite`] when the host names no project.
pub async fn serve_site(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, AppError> {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let Some(title) = site_title(host) else {
        debug!(host, "request does not address a project");
        return Err(AppError::NoSite(format!("no project is served at '{host}'")));
    };
    let dir = state
        .files()
        .destination(&title)
        .map_err(|e| AppError::NoSite(e.to_string()))?;

    let response = ServeDir::new(dir)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    Ok(response.map(Body::new))
}
