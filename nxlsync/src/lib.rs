//! nxlsync - resumable, integrity-verified content synchronizer
//!
//! This library reconciles a local directory with a server-published
//! manifest. The manifest lists every file as an ordered sequence of
//! content-addressed chunks; only chunks whose bytes are missing or stale on
//! disk are downloaded, and every downloaded byte is verified against its
//! SHA-1 hash before it is written.
//!
//! # Architecture
//!
//! ```text
//! ManifestSource ──► manifest::decode ──► Manifest::resolve_entries
//!                                                 │
//!                                                 ▼
//!                                        DownloadOrchestrator
//!                                     (rayon pool, one file per task)
//!                                                 │
//!                                                 ▼
//!                                        FileSynchronizer
//!                               (sequential Probe-Local / Fetch per chunk)
//!                                                 │
//!                                                 ▼
//!                                  ChunkFetcher ──► verify_chunk
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use nxlsync::{DownloadOrchestrator, ReqwestClient, SyncConfig, TracingSink};
//!
//! let config = SyncConfig::new("/games/maplestory".into());
//! let client = Arc::new(ReqwestClient::with_timeout(config.timeout)?);
//! let manifest = nxlsync::manifest::decode(&compressed_bytes)?;
//!
//! let orchestrator = DownloadOrchestrator::new(config, client, Arc::new(TracingSink));
//! let report = orchestrator.run(&manifest)?;
//! println!("{} files synced, {} failed", report.files_completed, report.failures.len());
//! ```

pub mod chunk;
pub mod codec;
pub mod config;
pub mod format;
pub mod http;
pub mod logging;
pub mod manifest;
pub mod settings;
pub mod sink;
pub mod sync;
pub mod updater;

pub use chunk::{ChunkFetcher, ChunkIntegrityError, FetchFailure, VerifyResult};
pub use config::SyncConfig;
pub use http::{HttpClient, HttpError, ReqwestClient};
pub use logging::{init_logging, LoggingConfig, LoggingGuard};
pub use manifest::{
    FileEntry, FileManifestSource, HttpManifestSource, Manifest, ManifestFormatError,
    ManifestSource, PathDecodeError, PathEncoding,
};
pub use settings::{Settings, SettingsError, SettingsProvider, SettingsStore};
pub use sink::{LogSink, MemorySink, TracingSink};
pub use sync::{DownloadOrchestrator, FileSyncError, SyncError, SyncProgress, SyncReport};
pub use updater::{UpdateError, UpdateOutcome, Updater};
