//! Progress reporting for a sync run.
//!
//! Workers bump shared atomic counters as chunks are reused or written; a
//! dedicated reporter thread polls them and invokes the caller's callback.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

/// Snapshot of a run's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    /// Bytes reused or written so far across all files.
    pub bytes_done: u64,
    /// Uncompressed total declared by the manifest.
    pub bytes_total: u64,
    pub files_completed: usize,
    pub files_failed: usize,
    pub files_total: usize,
}

impl SyncProgress {
    /// Percentage of declared bytes accounted for (0 when the total is 0).
    pub fn percent(&self) -> f64 {
        percent(self.bytes_done, self.bytes_total)
    }
}

pub(crate) fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}

/// Progress callback invoked from the reporter thread.
pub type SyncProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Counters shared by all workers of a run.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    bytes: AtomicU64,
    files_completed: AtomicUsize,
    files_failed: AtomicUsize,
    done: AtomicBool,
}

impl ProgressCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for `bytes` more and return the new global total.
    pub fn add_bytes(&self, bytes: u64) -> u64 {
        self.bytes.fetch_add(bytes, Ordering::SeqCst) + bytes
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    pub fn file_completed(&self) {
        self.files_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self, bytes_total: u64, files_total: usize) -> SyncProgress {
        SyncProgress {
            bytes_done: self.bytes(),
            bytes_total,
            files_completed: self.files_completed.load(Ordering::SeqCst),
            files_failed: self.files_failed.load(Ordering::SeqCst),
            files_total,
        }
    }

    pub fn signal_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Background thread feeding [`SyncProgress`] snapshots to a callback.
///
/// The reporter stops when dropped, after one final report.
pub struct ProgressReporter {
    handle: Option<JoinHandle<()>>,
    counters: Arc<ProgressCounters>,
}

impl ProgressReporter {
    pub fn start(
        counters: Arc<ProgressCounters>,
        bytes_total: u64,
        files_total: usize,
        callback: Arc<SyncProgressCallback>,
        poll_interval: Duration,
    ) -> Self {
        let polled = Arc::clone(&counters);

        let spawned = thread::Builder::new()
            .name("nxlsync-progress".to_string())
            .spawn(move || {
                while !polled.is_done() {
                    callback(polled.snapshot(bytes_total, files_total));
                    thread::park_timeout(poll_interval);
                }
                callback(polled.snapshot(bytes_total, files_total));
            });

        Self {
            handle: reporter_handle(spawned),
            counters,
        }
    }

    /// Stop the reporter and wait for the final report.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.counters.signal_done();
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            handle.join().ok();
        }
    }
}

/// The run continues without progress reports when the thread cannot start.
fn reporter_handle(spawned: io::Result<JoinHandle<()>>) -> Option<JoinHandle<()>> {
    match spawned {
        Ok(handle) => Some(handle),
        Err(error) => {
            warn!(
                error = %error,
                "Failed to start progress reporter; progress will not be reported"
            );
            None
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    /// Writer appending formatted events to a shared buffer.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_reporter_spawn_is_logged() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let handle = tracing::subscriber::with_default(subscriber, || {
            reporter_handle(Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "no threads left",
            )))
        });

        assert!(handle.is_none());
        let output = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(output.contains("Failed to start progress reporter"));
        assert!(output.contains("no threads left"));
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = ProgressCounters::new();
        assert_eq!(counters.add_bytes(100), 100);
        assert_eq!(counters.add_bytes(50), 150);
        counters.file_completed();
        counters.file_failed();

        let snapshot = counters.snapshot(300, 4);
        assert_eq!(snapshot.bytes_done, 150);
        assert_eq!(snapshot.files_completed, 1);
        assert_eq!(snapshot.files_failed, 1);
        assert_eq!(snapshot.files_total, 4);
        assert!((snapshot.percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percent_of_empty_total() {
        assert_eq!(percent(10, 0), 0.0);
    }

    #[test]
    fn test_reporter_delivers_final_snapshot() {
        let counters = Arc::new(ProgressCounters::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_callback = Arc::clone(&seen);

        let callback: SyncProgressCallback = Box::new(move |progress| {
            seen_by_callback.lock().push(progress);
        });

        let reporter = ProgressReporter::start(
            Arc::clone(&counters),
            1000,
            2,
            Arc::new(callback),
            Duration::from_secs(60),
        );
        counters.add_bytes(1000);
        counters.file_completed();
        reporter.stop();

        let seen = seen.lock();
        assert!(!seen.is_empty());
        let last = seen[seen.len() - 1];
        assert_eq!(last.bytes_done, 1000);
        assert_eq!(last.files_completed, 1);
        assert!(counters.is_done());
    }
}
