//! Status endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub projects: usize,
}

/// `GET /__status`
///
/// Counts projects so that a broken store shows up as a failed check.
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let projects = state.service.list_projects(None).await?;
    Ok(Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store_kind,
        projects: projects.len(),
    }))
}
