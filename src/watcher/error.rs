//! Watcher error types.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Errors that can occur while tailing or watching agent logs.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Tailed file disappeared.
    #[error("Watched file deleted: {0}")]
    FileDeleted(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Filesystem notification backend failed.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Agent resolution failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Nothing to watch.
    #[error("No agents configured")]
    NoAgents,
}

impl WatcherError {
    /// Map an I/O error on `path` to the most specific variant.
    pub(crate) fn from_io(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileDeleted(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }
}
