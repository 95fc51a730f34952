//! Shared application state for the `docyard` server.

use docyard_core::DocService;
use docyard_storage::StaticFiles;

/// Shared application state passed to all HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Account and project operations.
    pub service: DocService,
    /// Name of the store backend, reported by the status endpoint.
    pub store_kind: &'static str,
}

impl AppState {
    #[must_use]
    pub fn new(service: DocService, store_kind: &'static str) -> Self {
        Self {
            service,
            store_kind,
        }
    }

    /// Static root the doc-serving routes read from.
    #[must_use]
    pub fn files(&self) -> &StaticFiles {
        self.service.files()
    }
}
