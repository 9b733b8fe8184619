use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// An event published by the application or delivered by a broker.
///
/// `event_name` doubles as the outbound topic on publish and as the route key
/// when the event is relayed back to the application. The payload is never
/// interpreted, only forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub event_name: String,
    #[serde(default, with = "crate::opaque")]
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Unix epoch milliseconds. Zero means "not stamped yet".
    #[serde(default)]
    pub created_at: u64,
}

impl Event {
    #[must_use]
    pub fn new(event_name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            event_name: event_name.into(),
            payload: payload.into(),
            metadata: BTreeMap::new(),
            created_at: 0,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets `created_at` to the current time if it has not been set.
    pub fn stamp(&mut self) {
        if self.created_at == 0 {
            self.created_at = now_millis();
        }
    }

    /// Encodes the event for transport through a broker.
    ///
    /// # Errors
    ///
    /// Returns an error if `MsgPack` encoding fails.
    pub fn to_broker_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    /// Decodes an event received from a broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a `MsgPack`-encoded event.
    pub fn from_broker_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// A keyed value held by a state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    #[serde(default, with = "crate::opaque")]
    pub value: Vec<u8>,
}

impl Record {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A secret read from a secret store. Read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub key: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Milliseconds since the Unix epoch, saturating at zero for pre-epoch clocks.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Microseconds since the Unix epoch.
#[must_use]
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
