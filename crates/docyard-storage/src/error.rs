//! Static file error types.
//!
//! Every variant carries the name or path it failed on so the caller can
//! report which project was affected without a debugger.

use std::path::Path;

/// Errors from static file operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The archive or project name does not map to a usable directory name.
    #[error("invalid artifact name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The uploaded archive could not be read or contains an unsafe entry.
    #[error("could not read archive '{name}': {reason}")]
    Archive { name: String, reason: String },

    /// A filesystem operation failed.
    #[error("filesystem error at '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl StorageError {
    pub(crate) fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}
