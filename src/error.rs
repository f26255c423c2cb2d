//! Error handling and types

use std::path::PathBuf;
use thiserror::Error;

/// Mirroring and file operation errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error annotated with the path it happened on
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tree root could not be accessed at the start of a pass
    #[error("Root directory is not accessible: {}: {source}", .path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tree root exists but is not a directory
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Copying a file into the replica failed
    #[error("Copy from {} to {} failed: {cause}", .from.display(), .to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// Directory traversal failed
    #[error("Directory traversal failed: {0}")]
    DirectoryTraversal(#[from] walkdir::Error),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Installing the shutdown signal handler failed
    #[error("Signal handler setup failed: {0}")]
    Signal(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
