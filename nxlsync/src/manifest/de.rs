//! Lenient serde helpers for the server's manifest document.
//!
//! The server is inconsistent about quoting: chunk sizes arrive as decimal
//! strings, ids sometimes as bare numbers.

use serde::de::{self, Deserializer};
use serde::Deserialize;

use super::PathEncoding;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::String(s) => s,
            Self::Unsigned(n) => n.to_string(),
            Self::Signed(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
        }
    }

    fn into_u64<E: de::Error>(self) -> Result<u64, E> {
        match self {
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid size {:?}", s))),
            Self::Unsigned(n) => Ok(n),
            Self::Signed(n) => {
                u64::try_from(n).map_err(|_| E::custom(format!("negative size {}", n)))
            }
            Self::Float(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as u64),
            Self::Float(n) => Err(E::custom(format!("invalid size {}", n))),
        }
    }
}

pub(super) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into_string())
}

pub(super) fn size_list<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<StringOrNumber>::deserialize(deserializer)?
        .into_iter()
        .map(StringOrNumber::into_u64)
        .collect()
}

pub(super) fn path_encoding<'de, D>(deserializer: D) -> Result<PathEncoding, D::Error>
where
    D: Deserializer<'de>,
{
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(name
        .as_deref()
        .map(PathEncoding::from_name)
        .unwrap_or_default())
}

pub(super) fn epoch_seconds<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid timestamp {:?}", s))),
        StringOrNumber::Unsigned(n) => Ok(n as f64),
        StringOrNumber::Signed(n) => Ok(n as f64),
        StringOrNumber::Float(n) => Ok(n),
    }
}
