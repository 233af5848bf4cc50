//! Reusable byte buffers for the fetch/decompress/verify cycle.
//!
//! Each file task checks out one [`ChunkBuffers`] pair and keeps it for all
//! of its chunks; on drop the pair goes back to the pool for the next file.
//! Buffers keep their capacity, so steady-state syncing does not allocate per
//! chunk.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

/// Scratch space for one chunk at a time.
#[derive(Debug, Default)]
pub struct ChunkBuffers {
    /// Raw response body (compressed chunk).
    pub compressed: Vec<u8>,
    /// Decompressed chunk, or bytes read back from disk while probing.
    pub decompressed: Vec<u8>,
}

impl ChunkBuffers {
    /// Allocate buffers able to hold a chunk of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            compressed: Vec::with_capacity(capacity),
            decompressed: Vec::with_capacity(capacity),
        }
    }
}

/// Pool of [`ChunkBuffers`] shared by the workers of a run.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<ChunkBuffers>>,
    chunk_capacity: usize,
    max_retained: usize,
}

impl BufferPool {
    /// Create a pool whose buffers are sized for `chunk_capacity` bytes and
    /// which keeps at most `max_retained` idle pairs.
    pub fn new(chunk_capacity: usize, max_retained: usize) -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::new()),
            chunk_capacity,
            max_retained: max_retained.max(1),
        })
    }

    /// Take a buffer pair, allocating one if none is idle.
    pub fn checkout(self: &Arc<Self>) -> PooledBuffers {
        let buffers = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| ChunkBuffers::with_capacity(self.chunk_capacity));

        PooledBuffers {
            buffers,
            pool: Arc::clone(self),
        }
    }

    /// Number of idle buffer pairs.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn give_back(&self, mut buffers: ChunkBuffers) {
        // Whole-file probes can balloon a buffer far past chunk size.
        let limit = self.chunk_capacity.saturating_mul(2).max(64 * 1024);
        for buf in [&mut buffers.compressed, &mut buffers.decompressed] {
            buf.clear();
            if buf.capacity() > limit {
                buf.shrink_to(self.chunk_capacity);
            }
        }

        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(buffers);
        }
    }
}

/// A checked-out buffer pair; returns itself to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffers {
    buffers: ChunkBuffers,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffers {
    type Target = ChunkBuffers;

    fn deref(&self) -> &ChunkBuffers {
        &self.buffers
    }
}

impl DerefMut for PooledBuffers {
    fn deref_mut(&mut self) -> &mut ChunkBuffers {
        &mut self.buffers
    }
}

impl Drop for PooledBuffers {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buffers));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_allocates_with_capacity() {
        let pool = BufferPool::new(4096, 2);
        let buffers = pool.checkout();
        assert!(buffers.compressed.capacity() >= 4096);
        assert!(buffers.decompressed.capacity() >= 4096);
    }

    #[test]
    fn test_buffers_return_to_pool_cleared() {
        let pool = BufferPool::new(16, 2);
        {
            let mut buffers = pool.checkout();
            buffers.decompressed.extend_from_slice(b"data");
        }
        assert_eq!(pool.idle(), 1);

        let buffers = pool.checkout();
        assert!(buffers.decompressed.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_retains_at_most_max() {
        let pool = BufferPool::new(16, 1);
        let a = pool.checkout();
        let b = pool.checkout();
        drop(a);
        drop(b);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_oversized_buffers_shrink() {
        let pool = BufferPool::new(16, 1);
        {
            let mut buffers = pool.checkout();
            buffers.decompressed.reserve(1024 * 1024);
        }
        let buffers = pool.checkout();
        assert!(buffers.decompressed.capacity() < 1024 * 1024);
    }
}
