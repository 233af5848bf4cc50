//! SHA-1 chunk verification.

use sha1::{Digest, Sha1};

/// Outcome of verifying one decompressed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Match,
    /// Neither the decompressed nor the compressed length equals the
    /// expected size.
    SizeMismatch {
        expected: u64,
        decompressed: u64,
        compressed: u64,
    },
    /// The SHA-1 of the decompressed bytes differs from the expected hash.
    HashMismatch { expected: String, actual: String },
}

impl VerifyResult {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

/// Case-insensitive comparison of two hex digests.
pub fn hash_matches(actual: &str, expected: &str) -> bool {
    actual.eq_ignore_ascii_case(expected.trim())
}

/// Verify a downloaded chunk.
///
/// The size is acceptable when either the decompressed length or the
/// compressed length equals `expected_size`; manifests record one or the
/// other. The size is checked before the hash.
pub fn verify_chunk(
    decompressed: &[u8],
    compressed_len: usize,
    expected_size: u64,
    expected_hash: &str,
) -> VerifyResult {
    let decompressed_len = decompressed.len() as u64;
    let compressed_len = compressed_len as u64;

    if decompressed_len != expected_size && compressed_len != expected_size {
        return VerifyResult::SizeMismatch {
            expected: expected_size,
            decompressed: decompressed_len,
            compressed: compressed_len,
        };
    }

    let actual = sha1_hex(decompressed);
    if hash_matches(&actual, expected_hash) {
        VerifyResult::Match
    } else {
        VerifyResult::HashMismatch {
            expected: expected_hash.to_string(),
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

    #[test]
    fn test_sha1_hex() {
        assert_eq!(sha1_hex(b"hello world"), HELLO_SHA1);
        assert_eq!(sha1_hex(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn test_match_ignores_hash_case() {
        let upper = HELLO_SHA1.to_uppercase();
        assert_eq!(verify_chunk(b"hello world", 5, 11, HELLO_SHA1), VerifyResult::Match);
        assert_eq!(verify_chunk(b"hello world", 5, 11, &upper), VerifyResult::Match);
    }

    #[test]
    fn test_compressed_length_satisfies_size() {
        assert!(verify_chunk(b"hello world", 19, 19, HELLO_SHA1).is_match());
    }

    #[test]
    fn test_size_mismatch_checked_before_hash() {
        let result = verify_chunk(b"hello world", 19, 12, "bogus");
        assert_eq!(
            result,
            VerifyResult::SizeMismatch {
                expected: 12,
                decompressed: 11,
                compressed: 19,
            }
        );
    }

    #[test]
    fn test_hash_mismatch_reports_actual() {
        let result = verify_chunk(b"hello world", 19, 11, "0000");
        assert_eq!(
            result,
            VerifyResult::HashMismatch {
                expected: "0000".to_string(),
                actual: HELLO_SHA1.to_string(),
            }
        );
    }
}
