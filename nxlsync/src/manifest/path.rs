//! Obfuscated path keys.
//!
//! A key is the Base64 encoding of a relative path written in the manifest's
//! path encoding, optionally preceded by a byte-order mark.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;

use super::error::PathDecodeError;
use super::PathEncoding;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// A decoded, validated relative path from the manifest.
///
/// Both `/` and `\` are treated as separators; the path never contains a
/// parent component and is never absolute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// The path as written in the manifest (BOM removed).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty components of the path.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0
            .split(['/', '\\'])
            .filter(|part| !part.is_empty() && *part != ".")
    }

    /// Join this path onto `root` using the platform separator.
    pub fn to_fs_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.components() {
            path.push(part);
        }
        path
    }

    fn validate(key: &str, text: String) -> Result<Self, PathDecodeError> {
        let unsafe_path = || PathDecodeError::Unsafe {
            key: key.to_string(),
            path: text.clone(),
        };

        let absolute = text.starts_with('/')
            || text.starts_with('\\')
            || text.as_bytes().get(1) == Some(&b':');
        if absolute || text.contains('\0') {
            return Err(unsafe_path());
        }

        let path = Self(text.clone());
        let mut parts = 0;
        for part in path.components() {
            if part == ".." {
                return Err(unsafe_path());
            }
            parts += 1;
        }
        if parts == 0 {
            return Err(unsafe_path());
        }
        Ok(path)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decode an obfuscated key into a relative path.
///
/// Base64-decodes the key, decodes the bytes as UTF-16LE or ASCII according
/// to `encoding`, and strips one leading byte-order mark.
pub fn resolve_path(key: &str, encoding: PathEncoding) -> Result<RelativePath, PathDecodeError> {
    let bytes = BASE64_STANDARD
        .decode(key.trim())
        .map_err(|e| PathDecodeError::Base64 {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

    let text_error = || PathDecodeError::Text {
        key: key.to_string(),
        encoding: encoding.name(),
    };

    let text = match encoding {
        PathEncoding::Utf16 => {
            if bytes.len() % 2 != 0 {
                return Err(text_error());
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| text_error())?
        }
        PathEncoding::Ascii => String::from_utf8(bytes).map_err(|_| text_error())?,
    };

    let text = match text.strip_prefix(BYTE_ORDER_MARK) {
        Some(rest) => rest.to_string(),
        None => text,
    };

    RelativePath::validate(key, text)
}

/// Encode a relative path the way the server does.
///
/// Inverse of [`resolve_path`] for paths without a byte-order mark.
pub fn obfuscate_path(path: &str, encoding: PathEncoding) -> String {
    match encoding {
        PathEncoding::Utf16 => {
            let bytes: Vec<u8> = path.encode_utf16().flat_map(u16::to_le_bytes).collect();
            BASE64_STANDARD.encode(bytes)
        }
        PathEncoding::Ascii => BASE64_STANDARD.encode(path.as_bytes()),
    }
}
