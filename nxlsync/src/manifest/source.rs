//! Where compressed manifests come from.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::debug;

use crate::http::{HttpClient, HttpError};

/// Default URL of the manifest pointer document.
pub const DEFAULT_MANIFEST_POINTER_URL: &str = "http://3.129.199.50/manifest.txt";

/// Default location prefix of published manifests.
pub const DEFAULT_MANIFEST_BASE_URL: &str = "https://download2.nexon.net/Game/nxl/games/10100";

/// Errors raised while locating or fetching a manifest.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The pointer chain produced an empty identifier.
    #[error("no manifest id published at {0}")]
    EmptyId(String),
}

/// Supplier of compressed manifest bytes.
pub trait ManifestSource: Send + Sync {
    /// Identifier of the newest published manifest.
    fn latest_id(&self) -> Result<String, SourceError>;

    /// Compressed manifest bytes for `id`.
    fn fetch(&self, id: &str) -> Result<Vec<u8>, SourceError>;
}

/// Manifest source following the server's pointer chain.
///
/// `pointer_url` serves the URL of a document whose body is the current
/// manifest id; the manifest itself lives at `{base_url}/{id}`.
pub struct HttpManifestSource {
    client: Arc<dyn HttpClient>,
    pointer_url: String,
    base_url: String,
}

impl HttpManifestSource {
    pub fn new(
        client: Arc<dyn HttpClient>,
        pointer_url: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            pointer_url: pointer_url.into(),
            base_url: base_url.into(),
        }
    }

    /// Source using the default pointer and base URLs.
    pub fn with_defaults(client: Arc<dyn HttpClient>) -> Self {
        Self::new(client, DEFAULT_MANIFEST_POINTER_URL, DEFAULT_MANIFEST_BASE_URL)
    }

    /// Location of the manifest with the given id.
    pub fn manifest_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), id)
    }
}

impl ManifestSource for HttpManifestSource {
    fn latest_id(&self) -> Result<String, SourceError> {
        let id_url = self.client.get_text(&self.pointer_url)?.trim().to_string();
        if id_url.is_empty() {
            return Err(SourceError::EmptyId(self.pointer_url.clone()));
        }
        debug!(url = %id_url, "Resolved manifest id location");

        let id = self.client.get_text(&id_url)?.trim().to_string();
        if id.is_empty() {
            return Err(SourceError::EmptyId(id_url));
        }
        Ok(id)
    }

    fn fetch(&self, id: &str) -> Result<Vec<u8>, SourceError> {
        Ok(self.client.get(&self.manifest_url(id))?)
    }
}

/// Manifest source reading a compressed manifest from disk.
///
/// The id is the SHA-1 of the file contents, so an unchanged file is
/// recognised as already synced.
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read(&self) -> Result<Vec<u8>, SourceError> {
        fs::read(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl ManifestSource for FileManifestSource {
    fn latest_id(&self) -> Result<String, SourceError> {
        let bytes = self.read()?;
        Ok(format!("{:x}", Sha1::digest(&bytes)))
    }

    fn fetch(&self, _id: &str) -> Result<Vec<u8>, SourceError> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::MockHttpClient;
    use tempfile::TempDir;

    #[test]
    fn test_http_source_follows_pointer_chain() {
        let client = MockHttpClient::default()
            .with("http://pointer/manifest.txt", b"http://ids/current\n".to_vec())
            .with("http://ids/current", b"  abc123  ".to_vec())
            .with("http://manifests/abc123", vec![1, 2, 3]);
        let source = HttpManifestSource::new(
            Arc::new(client),
            "http://pointer/manifest.txt",
            "http://manifests/",
        );

        let id = source.latest_id().unwrap();
        assert_eq!(id, "abc123");
        assert_eq!(source.fetch(&id).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_http_source_rejects_empty_id() {
        let client = MockHttpClient::default()
            .with("http://pointer", b"http://ids".to_vec())
            .with("http://ids", b"\n".to_vec());
        let source = HttpManifestSource::new(Arc::new(client), "http://pointer", "http://m");

        assert!(matches!(
            source.latest_id(),
            Err(SourceError::EmptyId(url)) if url == "http://ids"
        ));
    }

    #[test]
    fn test_manifest_url() {
        let source = HttpManifestSource::with_defaults(Arc::new(MockHttpClient::default()));
        assert_eq!(
            source.manifest_url("ff00"),
            "https://download2.nexon.net/Game/nxl/games/10100/ff00"
        );
    }

    #[test]
    fn test_file_source_id_is_content_hash() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest.bin");
        fs::write(&path, b"hello world").unwrap();

        let source = FileManifestSource::new(&path);
        assert_eq!(
            source.latest_id().unwrap(),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(source.fetch("ignored").unwrap(), b"hello world");
    }

    #[test]
    fn test_file_source_missing_file() {
        let source = FileManifestSource::new("/nonexistent/manifest.bin");
        assert!(matches!(source.latest_id(), Err(SourceError::Io { .. })));
    }
}
