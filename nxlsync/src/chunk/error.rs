//! Error types for chunk fetching.

use thiserror::Error;

use crate::http::HttpError;

/// Why a single fetch attempt was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchFailure {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error(
        "size mismatch: expected {expected}, got {decompressed} decompressed / {compressed} compressed"
    )]
    SizeMismatch {
        expected: u64,
        decompressed: u64,
        compressed: u64,
    },

    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// The hash is too short to derive a shard prefix from.
    #[error("chunk hash {0:?} cannot be addressed")]
    InvalidHash(String),
}

/// A chunk never verified within the attempt budget.
///
/// Fatal for the file that owns the chunk; other files are unaffected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "chunk {hash} of product {product} failed after {attempts} attempt(s): {last_failure}"
)]
pub struct ChunkIntegrityError {
    pub product: String,
    pub hash: String,
    pub attempts: u32,
    /// The failure observed on the final attempt.
    pub last_failure: FetchFailure,
}

/// Result of [`ChunkFetcher::fetch`](super::ChunkFetcher::fetch) when no
/// verified chunk was produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error(transparent)]
    Integrity(#[from] ChunkIntegrityError),

    #[error("chunk fetch cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_error_display_carries_context() {
        let err = ChunkIntegrityError {
            product: "10100".to_string(),
            hash: "bb22".to_string(),
            attempts: 6,
            last_failure: FetchFailure::HashMismatch {
                expected: "bb22".to_string(),
                actual: "cc33".to_string(),
            },
        };
        let text = err.to_string();
        assert!(text.contains("bb22"));
        assert!(text.contains("10100"));
        assert!(text.contains("6 attempt(s)"));
        assert!(text.contains("cc33"));
    }
}
