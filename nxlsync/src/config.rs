//! Configuration for a sync run.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::chunk::{DEFAULT_CHUNK_BASE_URL, DEFAULT_MAX_ATTEMPTS};
use crate::http::DEFAULT_TIMEOUT_SECS;

/// Configuration for the download orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Directory the manifest tree is reconciled into.
    pub install_dir: PathBuf,

    /// Location prefix of chunk objects.
    pub chunk_base_url: String,

    /// Per-attempt HTTP timeout.
    pub timeout: Duration,

    /// Attempts per chunk before it is declared corrupt.
    pub max_attempts: u32,

    /// How often the progress callback is invoked.
    pub progress_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("."),
            chunk_base_url: DEFAULT_CHUNK_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress_interval: Duration::from_millis(250),
        }
    }
}

impl SyncConfig {
    /// Create a new configuration with the given install directory.
    pub fn new(install_dir: PathBuf) -> Self {
        Self {
            install_dir,
            ..Default::default()
        }
    }

    /// Set the chunk location prefix.
    pub fn with_chunk_base_url(mut self, url: impl Into<String>) -> Self {
        self.chunk_base_url = url.into();
        self
    }

    /// Set the per-attempt HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the attempt budget per chunk (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the progress callback interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Size of the file worker pool: the host's available parallelism.
    pub fn worker_count(&self) -> usize {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}
