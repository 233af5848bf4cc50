//! Whole-manifest synchronization.
//!
//! The orchestrator prepares the install directory, creates directory
//! placeholders, then fans file entries out over a bounded rayon pool. Each
//! file is handled by a [`FileSynchronizer`] on one worker; chunks within a
//! file never run concurrently.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::error::{FileSyncError, SyncError, SyncResult};
use super::file::{FileSummary, FileSynchronizer};
use super::progress::{ProgressCounters, ProgressReporter, SyncProgressCallback};
use super::report::{FileFailure, SyncReport};
use crate::chunk::{BufferPool, ChunkFetcher};
use crate::config::SyncConfig;
use crate::http::HttpClient;
use crate::manifest::{check_soft_invariants, Manifest, RelativePath, ResolvedEntry};
use crate::sink::LogSink;

/// Upper bound on the capacity pooled buffers are allocated with.
const MAX_POOLED_CHUNK: usize = 64 * 1024 * 1024;

type FileOutcome = (String, Result<FileSummary, FileSyncError>);

/// Runs a manifest against the install directory.
pub struct DownloadOrchestrator {
    config: SyncConfig,
    client: Arc<dyn HttpClient>,
    sink: Arc<dyn LogSink>,
    cancellation: CancellationToken,
    progress_callback: Option<Arc<SyncProgressCallback>>,
}

impl DownloadOrchestrator {
    /// Create an orchestrator sharing one HTTP client and one log sink
    /// across all workers.
    pub fn new(config: SyncConfig, client: Arc<dyn HttpClient>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            client,
            sink,
            cancellation: CancellationToken::new(),
            progress_callback: None,
        }
    }

    /// Stop scheduling files and chunks once `cancellation` fires.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Invoke `callback` with progress snapshots while a run is active.
    pub fn with_progress_callback(mut self, callback: SyncProgressCallback) -> Self {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Token observed by this orchestrator; cancel it to stop a run.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Reconcile the install directory with `manifest`.
    ///
    /// Per-entry problems are collected in the report; only failures to set
    /// up the run itself are returned as errors.
    pub fn run(&self, manifest: &Manifest) -> SyncResult<SyncReport> {
        let started = Instant::now();
        let root = self.config.install_dir.as_path();
        fs::create_dir_all(root).map_err(|source| SyncError::CreateRoot {
            path: root.to_path_buf(),
            source,
        })?;

        info!(
            product = %manifest.product,
            version = %manifest.version,
            entries = manifest.files.len(),
            root = %root.display(),
            "Starting sync"
        );

        let mut report = SyncReport {
            bytes_expected: manifest.total_uncompressed_size,
            warnings: check_soft_invariants(manifest),
            ..Default::default()
        };
        for warning in &report.warnings {
            self.sink.warn(&format!("Manifest warning: {}", warning));
        }

        let resolved = manifest.resolve_entries();
        for (key, error) in &resolved.skipped {
            self.sink.warn(&format!("Skipping entry {}: {}", key, error));
        }
        report.skipped = resolved.skipped.clone();

        let (mut directories, files): (Vec<_>, Vec<_>) = resolved
            .iter(manifest)
            .partition(|resolved| resolved.entry.is_directory());
        // Parents before children.
        directories.sort_by(|a, b| a.path.cmp(b.path));

        for directory in &directories {
            match self.create_directory(root, directory.path) {
                Ok(true) => report.directories_created += 1,
                Ok(false) => {}
                Err(error) => {
                    self.sink.warn(&format!(
                        "Failed to create directory {}: {}",
                        directory.path, error
                    ));
                    report.failures.push(FileFailure {
                        path: directory.path.to_string(),
                        error,
                    });
                }
            }
        }

        let (outcomes, bytes) = self.sync_files(manifest, &files)?;
        for (path, result) in outcomes {
            match result {
                Ok(summary) => {
                    report.files_completed += 1;
                    report.summaries.push(summary);
                }
                Err(FileSyncError::Cancelled) => report.files_cancelled += 1,
                Err(error) => {
                    self.sink.warn(&format!("Failed to sync {}: {}", path, error));
                    report.failures.push(FileFailure { path, error });
                }
            }
        }

        report.bytes_synced = bytes;
        report.cancelled = self.cancellation.is_cancelled();
        report.elapsed = started.elapsed();

        self.sink.log(&format!(
            "Sync finished: {} files up to date, {} failed, {} skipped, {} cancelled",
            report.files_completed,
            report.failures.len(),
            report.skipped.len(),
            report.files_cancelled
        ));
        info!(
            completed = report.files_completed,
            failed = report.failures.len(),
            fetched = report.chunks_fetched(),
            reused = report.chunks_reused(),
            bytes = report.bytes_synced,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Sync finished"
        );

        Ok(report)
    }

    /// Ensure a directory placeholder exists, replacing a same-named file.
    ///
    /// Returns whether the directory had to be created.
    fn create_directory(&self, root: &Path, path: &RelativePath) -> Result<bool, FileSyncError> {
        let dest = path.to_fs_path(root);
        match fs::metadata(&dest) {
            Ok(meta) if meta.is_dir() => return Ok(false),
            Ok(_) => {
                self.sink
                    .warn(&format!("Replacing file {} with a directory", path));
                fs::remove_file(&dest).map_err(FileSyncError::write(&dest))?;
            }
            Err(_) => {}
        }

        fs::create_dir_all(&dest).map_err(FileSyncError::create_dir(&dest))?;
        self.sink.log(&format!("Created directory {}", path));
        Ok(true)
    }

    fn sync_files(
        &self,
        manifest: &Manifest,
        files: &[ResolvedEntry<'_>],
    ) -> SyncResult<(Vec<FileOutcome>, u64)> {
        let workers = self.config.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("nxlsync-worker-{}", i))
            .build()
            .map_err(|e| SyncError::WorkerPool(e.to_string()))?;

        let chunk_capacity = usize::try_from(manifest.largest_chunk_size())
            .unwrap_or(MAX_POOLED_CHUNK)
            .min(MAX_POOLED_CHUNK);
        let buffers = BufferPool::new(chunk_capacity, workers);
        debug!(workers, chunk_capacity, files = files.len(), "Worker pool ready");

        let fetcher = ChunkFetcher::new(
            Arc::clone(&self.client),
            self.config.chunk_base_url.clone(),
            Arc::clone(&self.sink),
        )
        .with_max_attempts(self.config.max_attempts)
        .with_cancellation(self.cancellation.clone());

        let counters = Arc::new(ProgressCounters::new());
        let reporter = self.progress_callback.as_ref().map(|callback| {
            ProgressReporter::start(
                Arc::clone(&counters),
                manifest.total_uncompressed_size,
                files.len(),
                Arc::clone(callback),
                self.config.progress_interval,
            )
        });

        let root = self.config.install_dir.as_path();
        let sink: &dyn LogSink = self.sink.as_ref();

        let outcomes: Vec<FileOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|resolved| {
                    let label = resolved.path.to_string();
                    if self.cancellation.is_cancelled() {
                        return (label, Err(FileSyncError::Cancelled));
                    }

                    let mut scratch = buffers.checkout();
                    let synchronizer = FileSynchronizer::new(
                        &manifest.product,
                        &fetcher,
                        sink,
                        &counters,
                        manifest.total_uncompressed_size,
                    )
                    .with_cancellation(self.cancellation.clone());

                    let result = synchronizer.sync(
                        &label,
                        &resolved.path.to_fs_path(root),
                        resolved.entry,
                        &mut scratch,
                    );
                    match &result {
                        Ok(_) => counters.file_completed(),
                        Err(e) if !e.is_cancelled() => counters.file_failed(),
                        Err(_) => {}
                    }
                    (label, result)
                })
                .collect()
        });

        if let Some(reporter) = reporter {
            reporter.stop();
        }

        Ok((outcomes, counters.bytes()))
    }
}
