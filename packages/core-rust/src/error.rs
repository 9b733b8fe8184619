//! Canonical error taxonomy and the single status table shared by every
//! transport adapter.
//!
//! Facades return [`SidecarError`]. Adapters never inspect error variants
//! themselves: they call [`SidecarError::status`] and render the resulting
//! [`WireStatus`] in their protocol's terms (HTTP status, RPC code, or
//! `grpc-status`), plus a [`WireError`] body.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability kind under which a backend component is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Store,
    Broker,
    Secret,
}

impl ComponentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Broker => "broker",
            Self::Secret => "secret store",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by sidecar operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SidecarError {
    /// Malformed or missing input, detected before any backend call.
    #[error("{0}")]
    BadRequest(String),
    /// No component registered under the given id.
    #[error("component not found: {kind} {id}")]
    ComponentNotFound { kind: ComponentKind, id: String },
    /// The store exists but holds no record under the key.
    #[error("there is no such record at store {store_id} and key {key}")]
    RecordNotFound { store_id: String, key: String },
    /// Any other backend or encoding failure.
    #[error("{0}")]
    Internal(String),
    /// The local application did not answer a relay in time.
    #[error("relay timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl SidecarError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::BadRequest(detail.into())
    }

    pub fn internal(detail: impl fmt::Display) -> Self {
        Self::Internal(detail.to_string())
    }

    pub fn component_not_found(kind: ComponentKind, id: impl Into<String>) -> Self {
        Self::ComponentNotFound {
            kind,
            id: id.into(),
        }
    }

    /// The one mapping from error taxonomy to wire status.
    #[must_use]
    pub fn status(&self) -> WireStatus {
        match self {
            Self::BadRequest(_) => WireStatus::BadRequest,
            Self::ComponentNotFound { .. } | Self::RecordNotFound { .. } => WireStatus::NotFound,
            Self::Internal(_) | Self::Timeout { .. } => WireStatus::Internal,
        }
    }

    #[must_use]
    pub fn to_wire(&self) -> WireError {
        WireError::new(self.status(), self.to_string())
    }
}

/// Transport-independent outcome class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireStatus {
    Ok,
    BadRequest,
    NotFound,
    Internal,
}

impl WireStatus {
    /// Conventional numeric class, identical on every transport.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Internal => 500,
        }
    }

    /// gRPC status code (`OK`, `INVALID_ARGUMENT`, `NOT_FOUND`, `INTERNAL`).
    #[must_use]
    pub const fn grpc_code(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::BadRequest => 3,
            Self::NotFound => 5,
            Self::Internal => 13,
        }
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::Internal => "Internal Server Error",
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Classifies a numeric code received from a peer. Any 2xx is success.
    #[must_use]
    pub const fn from_code(code: u16) -> Self {
        match code {
            200..=299 => Self::Ok,
            400 => Self::BadRequest,
            404 => Self::NotFound,
            _ => Self::Internal,
        }
    }

    #[must_use]
    pub const fn from_grpc_code(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            3 => Self::BadRequest,
            5 => Self::NotFound,
            _ => Self::Internal,
        }
    }
}

/// Error body returned on every transport: `{status, code, detail}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub status: String,
    pub code: u16,
    pub detail: String,
}

impl WireError {
    pub fn new(status: WireStatus, detail: impl Into<String>) -> Self {
        Self {
            status: status.reason().to_string(),
            code: status.code(),
            detail: detail.into(),
        }
    }
}

impl From<&SidecarError> for WireError {
    fn from(err: &SidecarError) -> Self {
        err.to_wire()
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.status, self.code, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_covers_taxonomy() {
        assert_eq!(
            SidecarError::bad_request("x").status(),
            WireStatus::BadRequest
        );
        assert_eq!(
            SidecarError::component_not_found(ComponentKind::Store, "s1").status(),
            WireStatus::NotFound
        );
        assert_eq!(
            SidecarError::RecordNotFound {
                store_id: "s1".into(),
                key: "k".into()
            }
            .status(),
            WireStatus::NotFound
        );
        assert_eq!(SidecarError::internal("boom").status(), WireStatus::Internal);
        assert_eq!(
            SidecarError::Timeout { timeout_ms: 5 }.status(),
            WireStatus::Internal
        );
    }

    #[test]
    fn codes_follow_http_classes() {
        assert_eq!(WireStatus::Ok.code(), 200);
        assert_eq!(WireStatus::BadRequest.code(), 400);
        assert_eq!(WireStatus::NotFound.code(), 404);
        assert_eq!(WireStatus::Internal.code(), 500);
    }

    #[test]
    fn grpc_codes_round_trip() {
        for status in [
            WireStatus::Ok,
            WireStatus::BadRequest,
            WireStatus::NotFound,
            WireStatus::Internal,
        ] {
            assert_eq!(WireStatus::from_grpc_code(status.grpc_code()), status);
            assert_eq!(WireStatus::from_code(status.code()), status);
        }
    }

    #[test]
    fn unknown_codes_are_internal() {
        assert_eq!(WireStatus::from_code(503), WireStatus::Internal);
        assert_eq!(WireStatus::from_code(204), WireStatus::Ok);
        assert_eq!(WireStatus::from_grpc_code(14), WireStatus::Internal);
    }

    #[test]
    fn wire_error_shape() {
        let err = SidecarError::component_not_found(ComponentKind::Broker, "topicB");
        let wire = err.to_wire();
        assert_eq!(wire.status, "Not Found");
        assert_eq!(wire.code, 404);
        assert_eq!(wire.detail, "component not found: broker topicB");

        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["code"], 404);
        assert_eq!(json["status"], "Not Found");
    }
}
