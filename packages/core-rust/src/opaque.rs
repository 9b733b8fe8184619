//! Serde adapter for opaque byte payloads.
//!
//! Binary formats (`MsgPack`) carry the bytes as a `bin` value. Human-readable
//! formats (JSON) embed them as a JSON document so applications can post
//! structured payloads without base64:
//!
//! - empty bytes <-> `null`
//! - bytes that parse as JSON <-> that JSON value
//! - other valid UTF-8 -> a JSON string
//! - anything else fails to serialize
//!
//! Use with `#[serde(with = "crate::opaque")]`.

use serde::de::Deserializer;
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};

/// Renders opaque bytes as a JSON value.
///
/// # Errors
///
/// Returns the UTF-8 error when the bytes are neither JSON nor text.
pub fn to_json(bytes: &[u8]) -> Result<serde_json::Value, std::str::Utf8Error> {
    if bytes.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    if let Ok(value) = serde_json::from_slice(bytes) {
        return Ok(value);
    }
    std::str::from_utf8(bytes).map(|s| serde_json::Value::String(s.to_owned()))
}

/// Stores a JSON value as its compact serialized bytes. `null` becomes empty.
#[must_use]
pub fn from_json(value: &serde_json::Value) -> Vec<u8> {
    if value.is_null() {
        return Vec::new();
    }
    // Serializing a `Value` into a Vec cannot fail.
    serde_json::to_vec(value).unwrap_or_default()
}

/// Serde `serialize_with` entry point.
///
/// # Errors
///
/// Fails on human-readable serializers when the bytes cannot be rendered.
pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    if !serializer.is_human_readable() {
        return serde_bytes::serialize(bytes, serializer);
    }
    let value = to_json(bytes)
        .map_err(|e| S::Error::custom(format!("opaque payload is neither JSON nor UTF-8: {e}")))?;
    value.serialize(serializer)
}

/// Serde `deserialize_with` entry point.
///
/// # Errors
///
/// Propagates the underlying deserializer error.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    if deserializer.is_human_readable() {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(from_json(&value))
    } else {
        serde_bytes::deserialize(deserializer)
    }
}
