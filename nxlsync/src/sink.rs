//! Log sink for user-facing sync events.
//!
//! Every notable event of a sync run (directory creation, chunk reuse, chunk
//! fetch start/success/failure, size mismatches, per-file summaries) is
//! emitted as one text line through a [`LogSink`]. The sink is injected into
//! each component instead of being reached through global state, so callers
//! decide where lines end up: `tracing`, a terminal, or memory.

use parking_lot::Mutex;

/// Destination for sync event lines.
///
/// Implementations must be safe to call from many worker threads at once;
/// lines from a single file synchronization arrive in order.
pub trait LogSink: Send + Sync {
    /// Record an informational line.
    fn log(&self, line: &str);

    /// Record a line describing a problem (mismatch, retry, failure).
    fn warn(&self, line: &str) {
        self.log(line);
    }
}

/// Sink forwarding lines to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, line: &str) {
        tracing::info!("{}", line);
    }

    fn warn(&self, line: &str) {
        tracing::warn!("{}", line);
    }
}

/// Append-only in-memory sink.
///
/// Useful for embedding (drain lines on a UI thread) and for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Remove and return every line recorded so far.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Number of recorded lines containing `needle`.
    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl LogSink for MemorySink {
    fn log(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, line: &str) {
        self(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.log("first");
        sink.warn("second");

        assert_eq!(sink.lines(), vec!["first", "second"]);
    }

    #[test]
    fn test_memory_sink_drain_empties() {
        let sink = MemorySink::new();
        sink.log("a");

        assert_eq!(sink.drain(), vec!["a"]);
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_memory_sink_concurrent_writers() {
        let sink = Arc::new(MemorySink::new());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..100 {
                        sink.log(&format!("worker {} line {}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.lines().len(), 400);
        assert_eq!(sink.count_containing("worker 2 "), 100);
    }

    #[test]
    fn test_closure_sink() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = Arc::clone(&captured);
        let sink = move |line: &str| captured_clone.lock().push(line.to_string());

        sink.log("hello");
        assert_eq!(captured.lock().as_slice(), ["hello".to_string()]);
    }
}
