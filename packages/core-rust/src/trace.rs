//! Trace identity and finished-span records.
//!
//! Trace context travels between processes as a W3C `traceparent` value:
//! `00-<32 hex trace id>-<16 hex span id>-<2 hex flags>`.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Header / metadata key carrying the W3C trace context.
pub const TRACEPARENT: &str = "traceparent";

/// Identifies one span within one trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    /// Starts a fresh trace with a random trace and span id.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
        }
    }

    /// A new span in the same trace.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
        }
    }

    /// Parses a `traceparent` value. Returns `None` for anything malformed,
    /// including the all-zero ids the W3C format reserves as invalid.
    #[must_use]
    pub fn from_traceparent(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if version.len() != 2 || flags.len() != 2 || !is_hex(version) || !is_hex(flags) {
            return None;
        }
        if trace_id.len() != 32 || span_id.len() != 16 {
            return None;
        }
        if !is_hex(trace_id) || !is_hex(span_id) || is_zero(trace_id) || is_zero(span_id) {
            return None;
        }
        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            span_id: span_id.to_ascii_lowercase(),
        })
    }

    #[must_use]
    pub fn to_traceparent(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }
}

fn new_span_id() -> String {
    format!("{:016x}", rand::rng().random_range(1..=u64::MAX))
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_zero(s: &str) -> bool {
    s.bytes().all(|b| b == b'0')
}

/// Final status of a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    #[default]
    Unset,
    Error,
    Ok,
}

/// A span as kept in the trace buffer and returned by `Health.Trace`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanRecord {
    pub name: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub trace_id: String,
    /// Unix epoch microseconds.
    pub started_at: u64,
    /// Unix epoch microseconds; `None` while the span is open.
    #[serde(default)]
    pub ended_at: Option<u64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub status: SpanStatus,
    #[serde(default)]
    pub status_message: String,
}
