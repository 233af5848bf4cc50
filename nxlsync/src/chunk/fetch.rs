//! Chunk download with decompression, verification and bounded retry.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::buffer::ChunkBuffers;
use super::error::{ChunkIntegrityError, FetchError, FetchFailure};
use super::verify::{verify_chunk, VerifyResult};
use super::chunk_url;
use crate::codec;
use crate::http::HttpClient;
use crate::sink::LogSink;

/// Default number of attempts per chunk (one try plus five retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// One chunk to download.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'a> {
    pub product: &'a str,
    /// Hex SHA-1 of the decompressed chunk; also its address.
    pub hash: &'a str,
    pub expected_size: u64,
    /// Where the caller will write the chunk. Carried through untouched.
    pub offset: u64,
}

/// A verified chunk, borrowed from the caller's buffers.
#[derive(Debug)]
pub struct FetchedChunk<'b> {
    pub offset: u64,
    pub bytes: &'b [u8],
}

/// Downloads single chunks.
///
/// Every attempt re-fetches the chunk from scratch, inflates it and checks
/// it with [`verify_chunk`]. Network, decompression, size and hash failures
/// all consume one attempt; after `max_attempts` the chunk is reported as a
/// [`ChunkIntegrityError`].
pub struct ChunkFetcher {
    client: Arc<dyn HttpClient>,
    base_url: String,
    max_attempts: u32,
    sink: Arc<dyn LogSink>,
    cancellation: CancellationToken,
}

impl ChunkFetcher {
    pub fn new(
        client: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sink,
            cancellation: CancellationToken::new(),
        }
    }

    /// Set the total attempt budget (minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Observe `cancellation` at every retry boundary.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Download and verify one chunk into `buffers`.
    ///
    /// On success the returned bytes live in `buffers.decompressed`.
    pub fn fetch<'b>(
        &self,
        request: &ChunkRequest<'_>,
        buffers: &'b mut ChunkBuffers,
    ) -> Result<FetchedChunk<'b>, FetchError> {
        let integrity_error = |attempts, last_failure| ChunkIntegrityError {
            product: request.product.to_string(),
            hash: request.hash.to_string(),
            attempts,
            last_failure,
        };

        let url = match chunk_url(&self.base_url, request.product, request.hash) {
            Some(url) => url,
            None => {
                return Err(
                    integrity_error(0, FetchFailure::InvalidHash(request.hash.to_string())).into(),
                )
            }
        };

        let mut attempt = 0;
        loop {
            if self.cancellation.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            attempt += 1;
            self.sink.log(&format!("Downloading {}", request.hash));

            match self.attempt(&url, request, buffers) {
                Ok(()) => {
                    self.sink.log(&format!(
                        "Fetched chunk {} ({} bytes)",
                        request.hash,
                        buffers.decompressed.len()
                    ));
                    return Ok(FetchedChunk {
                        offset: request.offset,
                        bytes: &buffers.decompressed,
                    });
                }
                Err(failure) => {
                    self.sink.warn(&format!(
                        "Attempt {}/{} for chunk {} from {} failed: {}",
                        attempt, self.max_attempts, request.hash, url, failure
                    ));
                    if attempt >= self.max_attempts {
                        return Err(integrity_error(attempt, failure).into());
                    }
                }
            }
        }
    }

    fn attempt(
        &self,
        url: &str,
        request: &ChunkRequest<'_>,
        buffers: &mut ChunkBuffers,
    ) -> Result<(), FetchFailure> {
        self.client.get_into(url, &mut buffers.compressed)?;
        debug!(
            hash = %request.hash,
            compressed = buffers.compressed.len(),
            "Chunk body received"
        );

        codec::decompress_into(&buffers.compressed, &mut buffers.decompressed)
            .map_err(|e| FetchFailure::Decompress(e.to_string()))?;

        match verify_chunk(
            &buffers.decompressed,
            buffers.compressed.len(),
            request.expected_size,
            request.hash,
        ) {
            VerifyResult::Match => Ok(()),
            VerifyResult::SizeMismatch {
                expected,
                decompressed,
                compressed,
            } => Err(FetchFailure::SizeMismatch {
                expected,
                decompressed,
                compressed,
            }),
            VerifyResult::HashMismatch { expected, actual } => {
                Err(FetchFailure::HashMismatch { expected, actual })
            }
        }
    }
}
