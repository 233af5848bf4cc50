//! Outcome of a sync run.

use std::time::Duration;

use crate::manifest::{ManifestWarning, PathDecodeError};

use super::error::FileSyncError;
use super::file::FileSummary;

/// A file or directory placeholder that could not be brought up to date.
#[derive(Debug)]
pub struct FileFailure {
    /// Manifest path of the entry.
    pub path: String,
    pub error: FileSyncError,
}

/// Everything a run did, entry by entry.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Directory placeholders that did not exist before the run.
    pub directories_created: usize,
    pub files_completed: usize,
    /// Files not finished because the run was cancelled.
    pub files_cancelled: usize,
    pub summaries: Vec<FileSummary>,
    pub failures: Vec<FileFailure>,
    /// Entries whose key could not be decoded into a safe path.
    pub skipped: Vec<(String, PathDecodeError)>,
    /// Soft manifest invariants that did not hold.
    pub warnings: Vec<ManifestWarning>,
    /// Bytes reused or written across all files.
    pub bytes_synced: u64,
    /// Uncompressed total declared by the manifest.
    pub bytes_expected: u64,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl SyncReport {
    /// True when every resolvable entry is up to date.
    ///
    /// Skipped entries and soft warnings do not count against success.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled && self.files_cancelled == 0
    }

    pub fn chunks_fetched(&self) -> usize {
        self.summaries.iter().map(|s| s.fetched_chunks).sum()
    }

    pub fn chunks_reused(&self) -> usize {
        self.summaries.iter().map(|s| s.reused_chunks).sum()
    }

    /// Files whose length had to be corrected during finalization.
    pub fn files_resized(&self) -> usize {
        self.summaries.iter().filter(|s| s.resized).count()
    }
}
