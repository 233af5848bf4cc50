//! Error types for manifest decoding and path resolution.

use thiserror::Error;

/// The manifest could not be turned into a [`Manifest`](super::Manifest).
///
/// Fatal to the whole run; never retried.
#[derive(Debug, Error)]
pub enum ManifestFormatError {
    /// The zlib stream was corrupt or truncated.
    #[error("failed to decompress manifest: {0}")]
    Decompress(#[source] std::io::Error),

    /// The decompressed bytes were not UTF-8 text.
    #[error("manifest is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The text was not a JSON document of the expected shape.
    #[error("malformed manifest document: {0}")]
    Json(#[from] serde_json::Error),

    /// A file entry violates a structural invariant.
    #[error("invalid manifest entry {key}: {reason}")]
    InvalidEntry { key: String, reason: String },
}

/// An obfuscated key could not be turned into a usable relative path.
///
/// The orchestrator logs this and skips the entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathDecodeError {
    /// The key is not valid Base64.
    #[error("key {key} is not valid base64: {reason}")]
    Base64 { key: String, reason: String },

    /// The decoded bytes are not valid text in the declared encoding.
    #[error("key {key} is not valid {encoding} text")]
    Text { key: String, encoding: &'static str },

    /// The decoded path would land outside the installation root.
    #[error("key {key} resolves to unsafe path {path:?}")]
    Unsafe { key: String, path: String },
}
