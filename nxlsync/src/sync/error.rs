//! Error types for file synchronization and whole runs.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::chunk::ChunkIntegrityError;

/// Result type for whole-run operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Why a single file (or directory placeholder) could not be brought up to
/// date. Fatal for that entry only.
#[derive(Debug, Error)]
pub enum FileSyncError {
    /// A chunk could not be verified within its attempt budget.
    #[error(transparent)]
    Integrity(#[from] ChunkIntegrityError),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The entry declares content but lists no chunks to verify it with.
    #[error("{} declares {file_size} bytes but no chunks", path.display())]
    NoChunks { path: PathBuf, file_size: u64 },

    /// The run was cancelled before this file finished.
    #[error("synchronization cancelled")]
    Cancelled,
}

impl FileSyncError {
    pub(crate) fn read(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Read { path, source }
    }

    pub(crate) fn write(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Write { path, source }
    }

    pub(crate) fn create_dir(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::CreateDir { path, source }
    }

    /// True for cancellation, which is not counted as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to create install directory {}: {source}", path.display())]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
}
