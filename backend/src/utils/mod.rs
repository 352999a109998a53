//! Collection of general utility functions and common traits.
//!
//! This module serves as a repository for small, reusable helpers that are
//! shared by the credential codec, the envelope packager and the services.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub mod clock;
pub mod crypto;
pub mod jwt;

/// Normalizes an identifier carried in JSON.
///
/// Strings are trimmed and integers are stringified, so `" 42 "` and `42`
/// name the same guest. Blank strings and every other JSON type yield `None`.
pub fn normalize_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
        _ => return None,
    };
    if id.is_empty() { None } else { Some(id) }
}

/// Serde adapter around [`normalize_id`] for required id fields.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    normalize_id(&value)
        .ok_or_else(|| serde::de::Error::custom("identifier must be a non-blank string or integer"))
}

/// Serde adapter around [`normalize_id`] for optional id hints.
pub fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(normalize_id))
}
