//! Soft manifest invariants.
//!
//! The server does not guarantee that declared totals add up. Mismatches are
//! reported as warnings and never abort a run.

use std::fmt;

use super::Manifest;

/// A soft invariant that does not hold for a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestWarning {
    /// An entry's chunk sizes do not sum to its declared file size.
    ChunkSumMismatch {
        key: String,
        chunk_total: u64,
        file_size: u64,
    },

    /// The file sizes do not sum to the declared uncompressed total.
    TotalSizeMismatch { declared: u64, computed: u64 },
}

impl fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkSumMismatch {
                key,
                chunk_total,
                file_size,
            } => write!(
                f,
                "Chunk sizes of {} sum to {} but file size is {}",
                key, chunk_total, file_size
            ),
            Self::TotalSizeMismatch { declared, computed } => write!(
                f,
                "Manifest declares {} uncompressed bytes but files sum to {}",
                declared, computed
            ),
        }
    }
}

/// Check the soft invariants of `manifest`.
pub fn check_soft_invariants(manifest: &Manifest) -> Vec<ManifestWarning> {
    let mut warnings = Vec::new();
    let mut computed = 0u64;

    for (key, entry) in &manifest.files {
        if entry.is_directory() {
            continue;
        }
        computed = computed.saturating_add(entry.file_size);

        let chunk_total = entry.declared_chunk_total();
        if !entry.chunk_sizes.is_empty() && chunk_total != entry.file_size {
            warnings.push(ManifestWarning::ChunkSumMismatch {
                key: key.clone(),
                chunk_total,
                file_size: entry.file_size,
            });
        }
    }

    if computed != manifest.total_uncompressed_size {
        warnings.push(ManifestWarning::TotalSizeMismatch {
            declared: manifest.total_uncompressed_size,
            computed,
        });
    }

    warnings
}
