//! Error types for the watch session.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
///
/// All of these are fatal to the session; per-file failures are
/// [`ExportError`](crate::export::ExportError)s instead.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Watched folder {path} does not exist or is not a directory")]
    RootNotFound { path: PathBuf },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Invalid watch configuration: {reason}")]
    ConfigError { reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
