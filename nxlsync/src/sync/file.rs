//! Resumable synchronization of one file entry.
//!
//! Chunks are processed strictly in manifest order. Before a chunk is
//! downloaded the bytes already on disk at its offset are hashed; when they
//! match, the chunk is reused as-is. Otherwise the chunk is fetched, verified
//! and written at its offset. A chunk that cannot be verified is never
//! written, and chunks completed before a failure stay on disk for the next
//! run.
//!
//! # Probe windows
//!
//! For the chunk at `offset` with declared `size`, first match wins:
//!
//! 1. `[offset, offset + size)`
//! 2. `[offset, offset + first_chunk_size)` when `size` differs from the size
//!    of the entry's first chunk
//! 3. single-chunk entries only: the whole file, then the whole file
//!    re-compressed as a stored zlib stream
//!
//! A matched window contributes its own length to the offset; the
//! re-compressed match contributes the compressed length.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::FileSyncError;
use super::progress::{percent, ProgressCounters};
use crate::chunk::{hash_matches, sha1_hex, ChunkBuffers, ChunkFetcher, ChunkRequest, FetchError};
use crate::codec;
use crate::manifest::FileEntry;
use crate::sink::LogSink;

/// Outcome of one synchronized file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    /// Sum of the actual sizes of all reused and written chunks.
    pub written: u64,
    /// Declared file size.
    pub expected: u64,
    pub reused_chunks: usize,
    pub fetched_chunks: usize,
    /// Whether finalization changed the file length.
    pub resized: bool,
}

/// Drives one file entry through probe, fetch and finalization.
pub struct FileSynchronizer<'a> {
    product: &'a str,
    fetcher: &'a ChunkFetcher,
    sink: &'a dyn LogSink,
    progress: &'a ProgressCounters,
    total_bytes: u64,
    cancellation: CancellationToken,
}

impl<'a> FileSynchronizer<'a> {
    /// `total_bytes` is the manifest's declared total, used for the global
    /// percentage in progress lines.
    pub fn new(
        product: &'a str,
        fetcher: &'a ChunkFetcher,
        sink: &'a dyn LogSink,
        progress: &'a ProgressCounters,
        total_bytes: u64,
    ) -> Self {
        Self {
            product,
            fetcher,
            sink,
            progress,
            total_bytes,
            cancellation: CancellationToken::new(),
        }
    }

    /// Stop between chunks once `cancellation` fires.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Bring `dest` up to date with `entry`.
    ///
    /// `label` names the file in log lines (normally its manifest path).
    pub fn sync(
        &self,
        label: &str,
        dest: &Path,
        entry: &FileEntry,
        buffers: &mut ChunkBuffers,
    ) -> Result<FileSummary, FileSyncError> {
        debug!(path = %label, chunks = entry.chunk_count(), size = entry.file_size, "Syncing file");

        if entry.chunk_count() == 0 && entry.file_size > 0 {
            return Err(FileSyncError::NoChunks {
                path: dest.to_path_buf(),
                file_size: entry.file_size,
            });
        }

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(FileSyncError::create_dir(parent))?;
            }
        }

        let initial_len = match fs::metadata(dest) {
            Ok(meta) => Some(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(FileSyncError::read(dest)(e)),
        };

        let mut exists = initial_len.is_some();
        let first_chunk_size = entry.first_chunk_size();
        let single_chunk = entry.chunk_count() == 1;

        let mut offset = 0u64;
        let mut written = 0u64;
        let mut reused_chunks = 0;
        let mut fetched_chunks = 0;

        for (index, (hash, size)) in entry.chunks().enumerate() {
            if self.cancellation.is_cancelled() {
                return Err(FileSyncError::Cancelled);
            }

            let local = if exists {
                self.probe_local(
                    dest,
                    hash,
                    offset,
                    size,
                    first_chunk_size,
                    single_chunk,
                    buffers,
                )?
            } else {
                File::create(dest).map_err(FileSyncError::write(dest))?;
                exists = true;
                None
            };

            let actual = match local {
                Some(len) => {
                    reused_chunks += 1;
                    self.sink.log(&format!(
                        "Hash check passed, skipping downloading chunk {} ({}) of {}",
                        index, hash, label
                    ));
                    len
                }
                None => {
                    let len = self.fetch_and_write(label, dest, hash, size, offset, buffers)?;
                    fetched_chunks += 1;
                    len
                }
            };

            offset += actual;
            written += actual;
            let global = self.progress.add_bytes(actual);
            self.sink.log(&format!(
                "Downloaded: {:.2}% {} / {} total: {:.2}% {} / {}",
                percent(written, entry.file_size),
                written,
                entry.file_size,
                percent(global, self.total_bytes),
                global,
                self.total_bytes
            ));
        }

        if !exists {
            File::create(dest).map_err(FileSyncError::write(dest))?;
        }

        let resized = self.finalize(label, dest, entry.file_size, initial_len.unwrap_or(0), written)?;
        self.sink.log(&format!(
            "{} Total: {} Expected: {}",
            label, written, entry.file_size
        ));

        Ok(FileSummary {
            path: dest.to_path_buf(),
            written,
            expected: entry.file_size,
            reused_chunks,
            fetched_chunks,
            resized,
        })
    }

    /// Length of the on-disk bytes satisfying this chunk, if any.
    #[allow(clippy::too_many_arguments)]
    fn probe_local(
        &self,
        dest: &Path,
        hash: &str,
        offset: u64,
        size: u64,
        first_chunk_size: u64,
        single_chunk: bool,
        buffers: &mut ChunkBuffers,
    ) -> Result<Option<u64>, FileSyncError> {
        let mut file = File::open(dest).map_err(FileSyncError::read(dest))?;
        let file_len = file.metadata().map_err(FileSyncError::read(dest))?.len();

        let windows = [Some(size), (size != first_chunk_size).then_some(first_chunk_size)];
        for window in windows.into_iter().flatten() {
            let fits = offset
                .checked_add(window)
                .is_some_and(|end| end <= file_len);
            if !fits {
                continue;
            }
            read_range(&mut file, offset, window, &mut buffers.decompressed)
                .map_err(FileSyncError::read(dest))?;
            if hash_matches(&sha1_hex(&buffers.decompressed), hash) {
                return Ok(Some(window));
            }
        }

        if single_chunk {
            read_range(&mut file, 0, file_len, &mut buffers.decompressed)
                .map_err(FileSyncError::read(dest))?;
            if hash_matches(&sha1_hex(&buffers.decompressed), hash) {
                return Ok(Some(file_len));
            }

            codec::compress_stored_into(&buffers.decompressed, &mut buffers.compressed)
                .map_err(FileSyncError::read(dest))?;
            if hash_matches(&sha1_hex(&buffers.compressed), hash) {
                return Ok(Some(buffers.compressed.len() as u64));
            }
            debug!(path = %dest.display(), "Compressed file didn't match hash");
        }

        Ok(None)
    }

    fn fetch_and_write(
        &self,
        label: &str,
        dest: &Path,
        hash: &str,
        size: u64,
        offset: u64,
        buffers: &mut ChunkBuffers,
    ) -> Result<u64, FileSyncError> {
        let request = ChunkRequest {
            product: self.product,
            hash,
            expected_size: size,
            offset,
        };

        let chunk = match self.fetcher.fetch(&request, buffers) {
            Ok(chunk) => chunk,
            Err(FetchError::Cancelled) => return Err(FileSyncError::Cancelled),
            Err(FetchError::Integrity(e)) => {
                self.sink.warn(&format!("Giving up on {}: {}", label, e));
                return Err(e.into());
            }
        };

        write_at(dest, chunk.offset, chunk.bytes).map_err(FileSyncError::write(dest))?;
        let len = chunk.bytes.len() as u64;
        self.sink.log(&format!(
            "Wrote 0x{:X} at 0x{:X} to {}",
            len, chunk.offset, label
        ));
        Ok(len)
    }

    /// Reconcile the file length with the declared size.
    ///
    /// The file is resized when it was stale before the run and the chunks
    /// did not add up, or when it is still longer than declared. Returns
    /// whether the length on disk changed.
    fn finalize(
        &self,
        label: &str,
        dest: &Path,
        file_size: u64,
        initial_len: u64,
        written: u64,
    ) -> Result<bool, FileSyncError> {
        if written != file_size {
            self.sink.warn(&format!(
                "ERROR, mismatch written and expected size for {}: {} != {}",
                label, written, file_size
            ));
        }

        let current_len = fs::metadata(dest).map_err(FileSyncError::read(dest))?.len();
        let stale = initial_len != file_size && written != file_size;
        if !stale && current_len <= file_size {
            return Ok(false);
        }

        self.sink.warn(&format!(
            "Existing file size does not match expected size, trimming {} to {}",
            label, file_size
        ));
        OpenOptions::new()
            .write(true)
            .open(dest)
            .and_then(|file| file.set_len(file_size))
            .map_err(FileSyncError::write(dest))?;
        Ok(current_len != file_size)
    }
}

/// Read `len` bytes at `start` into `out`, replacing its contents.
fn read_range(file: &mut File, start: u64, len: u64, out: &mut Vec<u8>) -> io::Result<()> {
    let len = usize::try_from(len)
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "probe window too large"))?;
    out.clear();
    out.resize(len, 0);
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(out)
}

fn write_at(path: &Path, offset: u64, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.flush()
}
