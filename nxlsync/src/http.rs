//! HTTP client abstraction for testability

use std::io::Read;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Upper bound on the body preallocation taken from `Content-Length`.
const MAX_PREALLOC: usize = 8 * 1024 * 1024;

/// Errors produced by an [`HttpClient`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HttpError {
    /// The client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// The request could not be sent or the connection failed.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("failed to read response from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling in-memory clients in tests. A single instance is shared by
/// every worker of a sync run.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request, replacing the contents of `buf` with the
    /// response body.
    ///
    /// Reusing `buf` across calls lets callers keep one allocation alive for
    /// a whole sequence of chunk downloads.
    fn get_into(&self, url: &str, buf: &mut Vec<u8>) -> Result<(), HttpError>;

    /// Performs an HTTP GET request and returns the body.
    fn get(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let mut buf = Vec::new();
        self.get_into(url, &mut buf)?;
        Ok(buf)
    }

    /// Performs an HTTP GET request and returns the body as UTF-8 text.
    fn get_text(&self, url: &str) -> Result<String, HttpError> {
        let body = self.get(url)?;
        String::from_utf8(body).map_err(|e| HttpError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Real HTTP client implementation using blocking reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new ReqwestClient with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// The per-request timeout this client was built with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> HttpError {
        if e.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            HttpError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl HttpClient for ReqwestClient {
    fn get_into(&self, url: &str, buf: &mut Vec<u8>) -> Result<(), HttpError> {
        debug!(url = %url, "GET");

        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        buf.clear();
        if let Some(len) = response.content_length() {
            // The header is untrusted; larger bodies grow the buffer as they arrive.
            buf.reserve(usize::try_from(len).unwrap_or(0).min(MAX_PREALLOC));
        }
        response.read_to_end(buf).map_err(|e| HttpError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
