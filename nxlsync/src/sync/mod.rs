//! Reconciling a directory tree with a manifest.
//!
//! - [`DownloadOrchestrator`] runs a whole manifest across a worker pool
//! - [`FileSynchronizer`] brings one file up to date, chunk by chunk
//! - [`ProgressReporter`] feeds progress snapshots to a callback
//! - [`SyncReport`] summarizes what a run did

mod error;
mod file;
mod orchestrator;
mod progress;
mod report;

pub use error::{FileSyncError, SyncError, SyncResult};
pub use file::{FileSummary, FileSynchronizer};
pub use orchestrator::DownloadOrchestrator;
pub use progress::{ProgressCounters, ProgressReporter, SyncProgress, SyncProgressCallback};
pub use report::{FileFailure, SyncReport};
