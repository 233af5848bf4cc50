//! Integration tests for whole sync runs.
//!
//! These tests drive the public API end to end:
//! - compressed manifest → decode → orchestrator → files on disk
//! - chunk reuse on re-runs and partially written files
//! - directory placeholders, fatal chunks and soft manifest warnings
//!
//! Chunks are served by an in-memory `HttpClient` that counts requests.
//!
//! Run with: `cargo test --test sync_integration`

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use flate2::Compression;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

use nxlsync::chunk::sha1_hex;
use nxlsync::manifest::{self, obfuscate_path, PathEncoding};
use nxlsync::sync::SyncProgress;
use nxlsync::{
    codec, DownloadOrchestrator, FileSyncError, HttpClient, HttpError, Manifest, MemorySink,
    SyncConfig, SyncReport,
};

const BASE: &str = "http://cdn.test/games";
const PRODUCT: &str = "10100";

// ============================================================================
// Helper Functions
// ============================================================================

/// Chunk server double keyed by URL.
#[derive(Default)]
struct ChunkServer {
    objects: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl ChunkServer {
    fn url_for(data: &[u8]) -> String {
        let hash = sha1_hex(data);
        format!("{}/{}/{}/{}/{}", BASE, PRODUCT, PRODUCT, &hash[..2], hash)
    }

    /// Serve `data` at its content address.
    fn serve(mut self, data: &[u8]) -> Self {
        let body = codec::compress(data, Compression::default()).unwrap();
        self.objects.insert(Self::url_for(data), body);
        self
    }

    /// Serve `wrong` at the content address of `expected`.
    fn serve_corrupt(mut self, expected: &[u8], wrong: &[u8]) -> Self {
        let body = codec::compress(wrong, Compression::default()).unwrap();
        self.objects.insert(Self::url_for(expected), body);
        self
    }

    fn total_requests(&self) -> usize {
        self.requests.lock().len()
    }

    fn requests_for(&self, data: &[u8]) -> usize {
        let url = Self::url_for(data);
        self.requests.lock().iter().filter(|u| **u == url).count()
    }
}

impl HttpClient for ChunkServer {
    fn get_into(&self, url: &str, buf: &mut Vec<u8>) -> Result<(), HttpError> {
        self.requests.lock().push(url.to_string());
        match self.objects.get(url) {
            Some(body) => {
                buf.clear();
                buf.extend_from_slice(body);
                Ok(())
            }
            None => Err(HttpError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Manifest entry for a file made of `chunks`.
fn file_entry(chunks: &[&[u8]]) -> Value {
    let hashes: Vec<String> = chunks.iter().map(|c| sha1_hex(c)).collect();
    let sizes: Vec<String> = chunks.iter().map(|c| c.len().to_string()).collect();
    let total: usize = chunks.iter().map(|c| c.len()).sum();
    json!({ "objects": hashes, "objects_fsize": sizes, "fsize": total, "mtime": 1700000000 })
}

fn dir_entry() -> Value {
    json!({ "objects": ["__DIR__"], "objects_fsize": [], "fsize": 0, "mtime": 0 })
}

/// Build, compress and decode a manifest, as a server would publish it.
///
/// `declared_total` overrides the computed uncompressed total.
fn build_manifest(entries: &[(&str, Value)], declared_total: Option<u64>) -> Manifest {
    let mut files = serde_json::Map::new();
    let mut computed = 0u64;
    for (path, entry) in entries {
        computed += entry["fsize"].as_u64().unwrap_or(0);
        files.insert(obfuscate_path(path, PathEncoding::Utf16), entry.clone());
    }

    let document = json!({
        "product": PRODUCT,
        "version": "242",
        "platform": "win32",
        "filepath_encoding": "UTF16",
        "buildtime": 1700000000.25,
        "total_uncompressed_size": declared_total.unwrap_or(computed),
        "total_compressed_size": 0,
        "total_objects": 0,
        "files": files,
    });
    let compressed = codec::compress(document.to_string().as_bytes(), Compression::default())
        .unwrap();
    manifest::decode(&compressed).unwrap()
}

fn orchestrator(server: &Arc<ChunkServer>, root: &Path) -> (DownloadOrchestrator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let config = SyncConfig::new(root.to_path_buf()).with_chunk_base_url(BASE);
    let orchestrator = DownloadOrchestrator::new(config, server.clone(), sink.clone());
    (orchestrator, sink)
}

fn run(server: &Arc<ChunkServer>, root: &Path, manifest: &Manifest) -> (SyncReport, Arc<MemorySink>) {
    let (orchestrator, sink) = orchestrator(server, root);
    (orchestrator.run(manifest).unwrap(), sink)
}

fn chunk(byte: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| byte.wrapping_add(i as u8)).collect()
}

// ============================================================================
// Integration Tests
// ============================================================================

/// One file of two chunks is downloaded into a fresh directory.
#[test]
fn test_end_to_end_two_chunk_file() {
    let a = chunk(1, 100);
    let b = chunk(2, 50);
    let server = Arc::new(ChunkServer::default().serve(&a).serve(&b));
    let root = TempDir::new().unwrap();
    let manifest = build_manifest(&[("data/a.bin", file_entry(&[&a, &b]))], None);

    let (report, sink) = run(&server, root.path(), &manifest);

    assert!(report.is_success());
    assert_eq!(report.files_completed, 1);
    assert_eq!(report.chunks_fetched(), 2);
    assert_eq!(report.bytes_synced, 150);

    let written = fs::read(root.path().join("data").join("a.bin")).unwrap();
    assert_eq!(written.len(), 150);
    assert_eq!(&written[..100], a.as_slice());
    assert_eq!(&written[100..], b.as_slice());

    assert_eq!(sink.count_containing("Fetched chunk"), 2);
    assert_eq!(sink.count_containing("Total: 150 Expected: 150"), 1);
}

/// A second run over an up-to-date tree performs no fetches.
#[test]
fn test_second_run_is_idempotent() {
    let a = chunk(10, 64);
    let b = chunk(20, 32);
    let c = chunk(30, 16);
    let server = Arc::new(ChunkServer::default().serve(&a).serve(&b).serve(&c));
    let root = TempDir::new().unwrap();
    let manifest = build_manifest(
        &[
            ("one.bin", file_entry(&[&a, &b])),
            ("sub/two.bin", file_entry(&[&c])),
        ],
        None,
    );

    let (first, _) = run(&server, root.path(), &manifest);
    assert!(first.is_success());
    let requests_after_first = server.total_requests();
    assert_eq!(requests_after_first, 3);

    let (second, sink) = run(&server, root.path(), &manifest);

    assert!(second.is_success());
    assert_eq!(server.total_requests(), requests_after_first);
    assert_eq!(second.chunks_fetched(), 0);
    assert_eq!(second.chunks_reused(), 3);
    assert_eq!(sink.count_containing("Fetched chunk"), 0);
    assert_eq!(sink.count_containing("Hash check passed"), 3);
}

/// A file holding only its first chunk fetches just the rest.
#[test]
fn test_resume_fetches_only_missing_chunks() {
    let a = chunk(3, 100);
    let b = chunk(4, 50);
    let c = chunk(5, 25);
    let server = Arc::new(ChunkServer::default().serve(&a).serve(&b).serve(&c));
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("resume.bin"), &a).unwrap();
    let manifest = build_manifest(&[("resume.bin", file_entry(&[&a, &b, &c]))], None);

    let (report, _) = run(&server, root.path(), &manifest);

    assert!(report.is_success());
    assert_eq!(server.requests_for(&a), 0);
    assert_eq!(server.requests_for(&b), 1);
    assert_eq!(server.requests_for(&c), 1);

    let written = fs::read(root.path().join("resume.bin")).unwrap();
    assert_eq!(written, [a, b, c].concat());
}

/// Directory placeholders never hit the network and exist before any file
/// is written.
#[test]
fn test_directory_placeholders_created_first() {
    let a = chunk(6, 40);
    let server = Arc::new(ChunkServer::default().serve(&a));
    let root = TempDir::new().unwrap();
    let manifest = build_manifest(
        &[
            ("data", dir_entry()),
            ("data/empty", dir_entry()),
            ("data/file.bin", file_entry(&[&a])),
        ],
        None,
    );

    let (report, sink) = run(&server, root.path(), &manifest);

    assert!(report.is_success());
    assert_eq!(report.directories_created, 2);
    assert!(root.path().join("data").join("empty").is_dir());
    assert_eq!(server.total_requests(), 1);
    assert_eq!(sink.count_containing("Downloading __DIR__"), 0);

    let lines = sink.lines();
    let last_directory = lines
        .iter()
        .rposition(|l| l.contains("Created directory"))
        .unwrap();
    let first_download = lines
        .iter()
        .position(|l| l.contains("Downloading"))
        .unwrap();
    assert!(last_directory < first_download);
}

/// A chunk that never verifies fails its file only, after six attempts.
#[test]
fn test_fatal_chunk_fails_only_its_file() {
    let a = chunk(7, 100);
    let b = chunk(8, 50);
    let other = chunk(9, 70);
    let server = Arc::new(
        ChunkServer::default()
            .serve(&a)
            .serve_corrupt(&b, &chunk(99, 50))
            .serve(&other),
    );
    let root = TempDir::new().unwrap();
    let manifest = build_manifest(
        &[
            ("broken.bin", file_entry(&[&a, &b])),
            ("fine.bin", file_entry(&[&other])),
        ],
        None,
    );

    let (report, sink) = run(&server, root.path(), &manifest);

    assert!(!report.is_success());
    assert_eq!(report.files_completed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, "broken.bin");
    match &report.failures[0].error {
        FileSyncError::Integrity(e) => {
            assert_eq!(e.product, PRODUCT);
            assert_eq!(e.hash, sha1_hex(&b));
            assert_eq!(e.attempts, 6);
        }
        other => panic!("expected integrity error, got {:?}", other),
    }

    assert_eq!(server.requests_for(&b), 6);
    assert_eq!(fs::read(root.path().join("broken.bin")).unwrap(), a);
    assert_eq!(fs::read(root.path().join("fine.bin")).unwrap(), other);
    assert_eq!(sink.count_containing("broken.bin Total:"), 0);
    assert_eq!(sink.count_containing("fine.bin Total: 70 Expected: 70"), 1);
}

/// A declared total that does not add up is a warning, not a failure.
#[test]
fn test_soft_total_mismatch_only_warns() {
    let a = chunk(11, 30);
    let server = Arc::new(ChunkServer::default().serve(&a));
    let root = TempDir::new().unwrap();
    let manifest = build_manifest(&[("a.bin", file_entry(&[&a]))], Some(999));

    let (report, sink) = run(&server, root.path(), &manifest);

    assert!(report.is_success());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(sink.count_containing("Manifest warning"), 1);
    assert_eq!(sink.count_containing("declares 999"), 1);
}

/// A stale file longer than the new version ends at the declared size.
#[test]
fn test_stale_longer_file_is_truncated() {
    let a = chunk(12, 60);
    let server = Arc::new(ChunkServer::default().serve(&a));
    let root = TempDir::new().unwrap();
    let mut stale = a.clone();
    stale.extend_from_slice(&chunk(13, 500));
    fs::write(root.path().join("shrunk.bin"), &stale).unwrap();
    let manifest = build_manifest(&[("shrunk.bin", file_entry(&[&a]))], None);

    let (report, _) = run(&server, root.path(), &manifest);

    assert!(report.is_success());
    assert_eq!(report.files_resized(), 1);
    assert_eq!(server.total_requests(), 0);
    assert_eq!(fs::read(root.path().join("shrunk.bin")).unwrap(), a);
}

/// The progress callback sees the final byte count.
#[test]
fn test_progress_callback_reports_completion() {
    let a = chunk(14, 128);
    let server = Arc::new(ChunkServer::default().serve(&a));
    let root = TempDir::new().unwrap();
    let manifest = build_manifest(&[("p.bin", file_entry(&[&a]))], None);

    let seen: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_by_callback = Arc::clone(&seen);
    let (orchestrator, _) = orchestrator(&server, root.path());
    let orchestrator = orchestrator.with_progress_callback(Box::new(move |progress| {
        seen_by_callback.lock().push(progress);
    }));

    let report = orchestrator.run(&manifest).unwrap();
    assert!(report.is_success());

    let seen = seen.lock();
    let last = seen.last().copied().unwrap();
    assert_eq!(last.bytes_done, 128);
    assert_eq!(last.bytes_total, 128);
    assert_eq!(last.files_completed, 1);
    assert_eq!(last.files_total, 1);
}
