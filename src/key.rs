//! Canonical composition and parsing of cache keys (component C).
//!
//! Key grammar (normative, see `SPEC_FULL.md` §6):
//!
//! ```text
//! document_key := collection_name ":" primary_key_string
//! field_key    := document_key "." field_name
//! lease_key    := "lock:" document_key | "lock:" field_key
//! ```

use thiserror::Error;

/// A cache key that failed to parse back into its collection/pk/field parts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyFormatError {
    /// The key had no `:` separator at all.
    #[error("key {0:?} has no collection separator ':'")]
    Unparseable(String),
}

/// The decomposed form of a document or structured-field key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub collection: String,
    pub primary_key: String,
    pub field: Option<String>,
}

/// `"<collection_name>:<primary_key_string>"`.
pub fn document_key(collection: &str, primary_key: &str) -> String {
    format!("{collection}:{primary_key}")
}

/// `document_key(...) + "." + field_name`.
pub fn field_key(collection: &str, primary_key: &str, field: &str) -> String {
    format!("{}.{field}", document_key(collection, primary_key))
}

/// `"lock:" + k`, where `k` is a document or field key.
pub fn lease_key(key: &str) -> String {
    format!("lock:{key}")
}

/// Splits on the first `:` then the first `.`; the tail past the `.`, if
/// any, is the field name.
pub fn parse_key(key: &str) -> Result<ParsedKey, KeyFormatError> {
    let (collection, rest) = key
        .split_once(':')
        .ok_or_else(|| KeyFormatError::Unparseable(key.to_string()))?;

    let (primary_key, field) = match rest.split_once('.') {
        Some((pk, field)) => (pk, Some(field.to_string())),
        None => (rest, None),
    };

    Ok(ParsedKey {
        collection: collection.to_string(),
        primary_key: primary_key.to_string(),
        field,
    })
}
