//! HTTP routes for the `docyard` server.
//!
//! `/__status` reports liveness. Every other request is served from the
//! static root of the project named by the first label of the `Host` header.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

pub mod sites;
pub mod status;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/__status", get(status::status))
        .fallback(sites::serve_site)
        .with_state(state)
}
