//! Row-key decoding: resolving the dataset that owns a row.
//!
//! Two encodings coexist so older tables can migrate online without a data
//! rewrite. The primary encoding prefixes the key with the dataset id and a
//! single-byte separator; the legacy encoding is a fixed metadata tag
//! followed by `_<dataset id>`. Decoding tries the primary form first and
//! falls back to the legacy form.

use thiserror::Error;

/// Tag prefixing legacy metadata rows (`~METADATA_<dataset id>`).
pub const LEGACY_METADATA_TAG: &str = "~METADATA";

/// Default separator between the dataset id token and the key remainder.
pub const DEFAULT_SEPARATOR: u8 = b'~';

/// A row key resolved to its owning dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKey<'k> {
    /// Primary encoding: `<dataset id><separator><remainder>`.
    Primary {
        /// The dataset id token preceding the separator.
        dataset_id: &'k str,
        /// Key bytes following the separator.
        remainder: &'k [u8],
    },
    /// Legacy fixed-tag encoding: `~METADATA_<dataset id>`.
    LegacyTag {
        /// The dataset id following the metadata tag.
        dataset_id: &'k str,
    },
}

impl<'k> DatasetKey<'k> {
    /// The dataset id this key belongs to, whichever encoding matched.
    pub fn dataset_id(&self) -> &'k str {
        match self {
            DatasetKey::Primary { dataset_id, .. } => dataset_id,
            DatasetKey::LegacyTag { dataset_id } => dataset_id,
        }
    }
}

/// Error resolving a row key to a dataset.
#[derive(Debug, Error)]
pub enum KeyDecodeError {
    /// Neither the primary nor the legacy encoding matched.
    #[error("row key matches neither `<dataset>{separator}...` nor `{LEGACY_METADATA_TAG}_<dataset>`")]
    Unresolvable {
        /// The separator the primary decode was attempted with.
        separator: char,
    },
}

/// Resolve the dataset id of `row_key`, trying the primary encoding first
/// and the legacy tag second.
pub fn decode_dataset(row_key: &[u8], separator: u8) -> Result<DatasetKey<'_>, KeyDecodeError> {
    if let Some(key) = decode_primary(row_key, separator) {
        return Ok(key);
    }
    if let Some(key) = decode_legacy(row_key) {
        return Ok(key);
    }
    Err(KeyDecodeError::Unresolvable {
        separator: separator as char,
    })
}

/// `<dataset id><separator><remainder>`, id non-empty UTF-8.
fn decode_primary(row_key: &[u8], separator: u8) -> Option<DatasetKey<'_>> {
    let pos = row_key.iter().position(|byte| *byte == separator)?;
    if pos == 0 {
        return None;
    }
    let dataset_id = std::str::from_utf8(&row_key[..pos]).ok()?;
    Some(DatasetKey::Primary {
        dataset_id,
        remainder: &row_key[pos + 1..],
    })
}

/// `~METADATA_<dataset id>`, id non-empty UTF-8 to the end of the key.
fn decode_legacy(row_key: &[u8]) -> Option<DatasetKey<'_>> {
    let rest = row_key.strip_prefix(LEGACY_METADATA_TAG.as_bytes())?;
    let rest = rest.strip_prefix(b"_")?;
    if rest.is_empty() {
        return None;
    }
    let dataset_id = std::str::from_utf8(rest).ok()?;
    Some(DatasetKey::LegacyTag { dataset_id })
}
