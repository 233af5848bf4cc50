//! Content-addressed chunks.
//!
//! This module provides everything needed to obtain one verified chunk:
//! - The server's address scheme (`chunk_url`)
//! - SHA-1 verification with the dual size interpretation (`verify`)
//! - Download with bounded retry (`fetch`)
//! - Pooled scratch buffers (`buffer`)
//!
//! # Address scheme
//!
//! ```text
//! {base}/{product}/{product}/{hash[0..2]}/{hash}
//! ```
//!
//! The first two hex characters of the hash select a shard directory. The
//! hash is used exactly as written in the manifest.

mod buffer;
mod error;
mod fetch;
mod verify;

pub use buffer::{BufferPool, ChunkBuffers, PooledBuffers};
pub use error::{ChunkIntegrityError, FetchError, FetchFailure};
pub use fetch::{ChunkFetcher, ChunkRequest, FetchedChunk, DEFAULT_MAX_ATTEMPTS};
pub use verify::{hash_matches, sha1_hex, verify_chunk, VerifyResult};

/// Default location prefix of chunk objects.
pub const DEFAULT_CHUNK_BASE_URL: &str = "https://download2.nexon.net/Game/nxl/games";

/// Location of a chunk on the server.
///
/// Returns `None` when the hash is too short to carry a shard prefix.
pub fn chunk_url(base_url: &str, product: &str, hash: &str) -> Option<String> {
    let shard = hash.get(..2)?;
    Some(format!(
        "{}/{}/{}/{}/{}",
        base_url.trim_end_matches('/'),
        product,
        product,
        shard,
        hash
    ))
}
