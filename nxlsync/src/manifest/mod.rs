//! Manifest model and decoder.
//!
//! A manifest is a zlib-compressed JSON document describing a directory tree.
//! Each entry is keyed by an obfuscated path (Base64 of UTF-16LE or ASCII
//! text) and lists the SHA-1 hashes and sizes of the chunks that make up the
//! file, in offset order. Entries whose only chunk is [`DIRECTORY_SENTINEL`]
//! describe directories.
//!
//! ```ignore
//! let manifest = nxlsync::manifest::decode(&compressed)?;
//! let resolved = manifest.resolve_entries();
//! for entry in resolved.iter(&manifest) {
//!     println!("{} ({} chunks)", entry.path, entry.entry.chunk_count());
//! }
//! ```

mod de;
mod error;
mod path;
pub mod source;
mod validate;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::codec;

pub use error::{ManifestFormatError, PathDecodeError};
pub use path::{obfuscate_path, resolve_path, RelativePath};
pub use source::{FileManifestSource, HttpManifestSource, ManifestSource, SourceError};
pub use validate::{check_soft_invariants, ManifestWarning};

/// Chunk hash marking an entry as a directory placeholder.
pub const DIRECTORY_SENTINEL: &str = "__DIR__";

/// Text encoding of the obfuscated path keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathEncoding {
    /// UTF-16, little-endian.
    Utf16,
    /// Single-byte ASCII (UTF-8 compatible).
    #[default]
    Ascii,
}

impl PathEncoding {
    /// Parse the manifest's `filepath_encoding` value.
    ///
    /// `"utf16"` in any case selects UTF-16; everything else is ASCII.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("utf16") {
            Self::Utf16
        } else {
            Self::Ascii
        }
    }

    /// Name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf16 => "UTF-16",
            Self::Ascii => "ASCII",
        }
    }
}

/// One file or directory of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    /// Hex SHA-1 hashes of the decompressed chunks, in offset order.
    #[serde(rename = "objects", default)]
    pub chunk_hashes: Vec<String>,

    /// Expected size of each chunk.
    ///
    /// Usually the decompressed length, occasionally the compressed length.
    #[serde(rename = "objects_fsize", default, deserialize_with = "de::size_list")]
    pub chunk_sizes: Vec<u64>,

    /// Declared decompressed length of the whole file.
    #[serde(rename = "fsize", default)]
    pub file_size: u64,

    /// Advisory modification time; never used for verification.
    #[serde(rename = "mtime", default)]
    pub modified_time: i64,
}

impl FileEntry {
    /// Whether this entry is a directory placeholder.
    pub fn is_directory(&self) -> bool {
        self.chunk_hashes.len() == 1 && self.chunk_hashes[0] == DIRECTORY_SENTINEL
    }

    /// Number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunk_hashes.len()
    }

    /// Declared size of the first chunk, used as the alternate probe window.
    pub fn first_chunk_size(&self) -> u64 {
        self.chunk_sizes.first().copied().unwrap_or(0)
    }

    /// Sum of the declared chunk sizes.
    pub fn declared_chunk_total(&self) -> u64 {
        self.chunk_sizes.iter().sum()
    }

    /// Iterate `(hash, size)` pairs in offset order.
    pub fn chunks(&self) -> impl Iterator<Item = (&str, u64)> {
        self.chunk_hashes
            .iter()
            .map(String::as_str)
            .zip(self.chunk_sizes.iter().copied())
    }
}

/// Decoded manifest. Immutable once decoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Manifest {
    /// Product id, also the first component of chunk locations.
    #[serde(alias = "Product", deserialize_with = "de::string_or_number")]
    pub product: String,

    #[serde(alias = "Version", default, deserialize_with = "de::string_or_number")]
    pub version: String,

    #[serde(alias = "Platform", default)]
    pub platform: String,

    #[serde(
        rename = "filepath_encoding",
        default,
        deserialize_with = "de::path_encoding"
    )]
    pub path_encoding: PathEncoding,

    /// Entries keyed by obfuscated path.
    #[serde(alias = "Files", default)]
    pub files: BTreeMap<String, FileEntry>,

    #[serde(rename = "total_uncompressed_size", default)]
    pub total_uncompressed_size: u64,

    #[serde(rename = "total_compressed_size", default)]
    pub total_compressed_size: u64,

    #[serde(rename = "total_objects", default)]
    pub total_object_count: u64,

    /// Build time in (fractional) epoch seconds.
    #[serde(
        rename = "buildtime",
        alias = "BuildTime",
        alias = "build_time",
        default,
        deserialize_with = "de::epoch_seconds"
    )]
    pub build_timestamp: f64,
}

/// An entry whose key resolved to a usable path.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedEntry<'a> {
    pub key: &'a str,
    pub path: &'a RelativePath,
    pub entry: &'a FileEntry,
}

/// Result of resolving every key of a manifest.
#[derive(Debug, Clone, Default)]
pub struct ResolvedEntries {
    resolved: Vec<(String, RelativePath)>,
    /// Entries whose key could not be decoded, with the reason.
    pub skipped: Vec<(String, PathDecodeError)>,
}

impl ResolvedEntries {
    /// Pair each resolved path with its entry in `manifest`.
    pub fn iter<'a>(&'a self, manifest: &'a Manifest) -> impl Iterator<Item = ResolvedEntry<'a>> {
        self.resolved.iter().filter_map(move |(key, path)| {
            manifest.files.get(key).map(|entry| ResolvedEntry {
                key: key.as_str(),
                path,
                entry,
            })
        })
    }

    /// Number of entries that resolved.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl Manifest {
    /// Decode every obfuscated key with the manifest's path encoding.
    pub fn resolve_entries(&self) -> ResolvedEntries {
        let mut out = ResolvedEntries::default();
        for key in self.files.keys() {
            match resolve_path(key, self.path_encoding) {
                Ok(path) => out.resolved.push((key.clone(), path)),
                Err(e) => out.skipped.push((key.clone(), e)),
            }
        }
        out
    }

    /// Build time as a UTC date-time, if representable.
    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        if !self.build_timestamp.is_finite() {
            return None;
        }
        let secs = self.build_timestamp.trunc() as i64;
        let nanos = (self.build_timestamp.fract().abs() * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Largest declared chunk size, used to size pooled buffers.
    pub fn largest_chunk_size(&self) -> u64 {
        self.files
            .values()
            .filter(|entry| !entry.is_directory())
            .flat_map(|entry| entry.chunk_sizes.iter().copied())
            .max()
            .unwrap_or(0)
    }

    /// Number of directory placeholder entries.
    pub fn directory_count(&self) -> usize {
        self.files.values().filter(|e| e.is_directory()).count()
    }

    fn check_structure(&self) -> Result<(), ManifestFormatError> {
        for (key, entry) in &self.files {
            if entry.is_directory() {
                continue;
            }
            if entry.chunk_hashes.len() != entry.chunk_sizes.len() {
                return Err(ManifestFormatError::InvalidEntry {
                    key: key.clone(),
                    reason: format!(
                        "{} chunk hashes but {} chunk sizes",
                        entry.chunk_hashes.len(),
                        entry.chunk_sizes.len()
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Decode a compressed manifest.
///
/// Inflates the zlib stream, decodes UTF-8 and parses the JSON document.
/// Pure; performs no I/O.
pub fn decode(compressed: &[u8]) -> Result<Manifest, ManifestFormatError> {
    let inflated = codec::decompress(compressed).map_err(ManifestFormatError::Decompress)?;
    parse(String::from_utf8(inflated)?.as_str())
}

/// Parse an already-decompressed manifest document.
pub fn parse(text: &str) -> Result<Manifest, ManifestFormatError> {
    // Some publishers prepend a UTF-8 byte-order mark.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let manifest: Manifest = serde_json::from_str(text)?;
    manifest.check_structure()?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;

    const SAMPLE: &str = r#"{
        "buildtime": 1609459200.5,
        "filepath_encoding": "utf16",
        "platform": "win32",
        "product": "10100",
        "version": 230,
        "total_compressed_size": 120,
        "total_objects": 3,
        "total_uncompressed_size": 150,
        "files": {
            "ZABhAHQAYQA=": { "objects": ["__DIR__"], "objects_fsize": [], "fsize": 0, "mtime": 0 },
            "ZABhAHQAYQAvAGEALgBiAGkAbgA=": {
                "objects": ["aa11", "bb22"],
                "objects_fsize": ["100", "50"],
                "fsize": 150,
                "mtime": 1609459000
            }
        }
    }"#;

    #[test]
    fn test_parse_sample_manifest() {
        let manifest = parse(SAMPLE).unwrap();

        assert_eq!(manifest.product, "10100");
        assert_eq!(manifest.version, "230");
        assert_eq!(manifest.platform, "win32");
        assert_eq!(manifest.path_encoding, PathEncoding::Utf16);
        assert_eq!(manifest.total_uncompressed_size, 150);
        assert_eq!(manifest.total_object_count, 3);
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.directory_count(), 1);
        assert_eq!(manifest.largest_chunk_size(), 100);
    }

    #[test]
    fn test_chunk_sizes_accept_strings_and_numbers() {
        let text = r#"{"product": 1, "files": {"YQ==": {"objects": ["x", "y"], "objects_fsize": ["10", 20], "fsize": 30}}}"#;
        let manifest = parse(text).unwrap();
        let entry = &manifest.files["YQ=="];

        assert_eq!(entry.chunk_sizes, vec![10, 20]);
        assert_eq!(entry.declared_chunk_total(), 30);
        assert_eq!(manifest.path_encoding, PathEncoding::Ascii);
    }

    #[test]
    fn test_decode_compressed_manifest() {
        let packed = codec::compress(SAMPLE.as_bytes(), Compression::default()).unwrap();
        let manifest = decode(&packed).unwrap();
        assert_eq!(manifest, parse(SAMPLE).unwrap());
    }

    #[test]
    fn test_decode_rejects_uncompressed_bytes() {
        let err = decode(SAMPLE.as_bytes()).unwrap_err();
        assert!(matches!(err, ManifestFormatError::Decompress(_)));
    }

    #[test]
    fn test_decode_rejects_non_utf8() {
        let packed = codec::compress(&[0xff, 0xfe, 0x00], Compression::default()).unwrap();
        assert!(matches!(
            decode(&packed).unwrap_err(),
            ManifestFormatError::Utf8(_)
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let err = parse(r#"{"product": "1", "files": []}"#).unwrap_err();
        assert!(matches!(err, ManifestFormatError::Json(_)));
    }

    #[test]
    fn test_parse_rejects_mismatched_chunk_lists() {
        let text = r#"{"product": "1", "files": {"YQ==": {"objects": ["x", "y"], "objects_fsize": ["10"], "fsize": 10}}}"#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ManifestFormatError::InvalidEntry { ref key, .. } if key == "YQ=="));
    }

    #[test]
    fn test_directory_sentinel_detection() {
        let dir = FileEntry {
            chunk_hashes: vec![DIRECTORY_SENTINEL.to_string()],
            chunk_sizes: vec![],
            file_size: 0,
            modified_time: 0,
        };
        let file = FileEntry {
            chunk_hashes: vec![DIRECTORY_SENTINEL.to_string(), "ab".to_string()],
            chunk_sizes: vec![1, 1],
            file_size: 2,
            modified_time: 0,
        };
        assert!(dir.is_directory());
        assert!(!file.is_directory());
    }

    #[test]
    fn test_path_encoding_from_name() {
        assert_eq!(PathEncoding::from_name("UTF16"), PathEncoding::Utf16);
        assert_eq!(PathEncoding::from_name("utf16"), PathEncoding::Utf16);
        assert_eq!(PathEncoding::from_name("ascii"), PathEncoding::Ascii);
        assert_eq!(PathEncoding::from_name("utf8"), PathEncoding::Ascii);
    }

    #[test]
    fn test_built_at() {
        let manifest = parse(SAMPLE).unwrap();
        let built = manifest.built_at().unwrap();
        assert_eq!(built.timestamp(), 1_609_459_200);
        assert_eq!(built.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_resolve_entries_splits_skipped() {
        let text = r#"{"product": "1", "filepath_encoding": "ascii", "files": {
            "YS50eHQ=": {"objects": ["x"], "objects_fsize": ["1"], "fsize": 1},
            "!!!": {"objects": ["y"], "objects_fsize": ["1"], "fsize": 1}
        }}"#;
        let manifest = parse(text).unwrap();
        let resolved = manifest.resolve_entries();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.skipped.len(), 1);
        assert_eq!(resolved.skipped[0].0, "!!!");

        let entry = resolved.iter(&manifest).next().unwrap();
        assert_eq!(entry.path.as_str(), "a.txt");
        assert_eq!(entry.entry.file_size, 1);
    }
}
