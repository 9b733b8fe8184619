//! Outbound clients that relay broker deliveries to the local application.
//!
//! One client per application protocol; the orchestrator builds the one
//! matching the configured service protocol.

pub mod grpc;
pub mod http;
pub mod rpc;

use std::sync::Arc;

use async_trait::async_trait;
use sidecar_core::{Event, SidecarError, TraceContext};

pub use grpc::GrpcAppClient;
pub use http::HttpAppClient;
pub use rpc::RpcAppClient;

use crate::config::ServiceProtocol;

/// Why a relay to the application failed.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("no relay route for event {event_name}")]
    RouteNotFound { event_name: String },
    #[error("relay timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("application rejected event with status {status}: {detail}")]
    Rejected { status: String, detail: String },
    #[error("application unreachable: {0}")]
    Transport(String),
    #[error("failed to encode event: {0}")]
    Encode(String),
}

impl From<RelayError> for SidecarError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Timeout { timeout_ms } => SidecarError::Timeout { timeout_ms },
            other => SidecarError::internal(other),
        }
    }
}

/// Delivers one event to the local application at `target` (an HTTP path or
/// a `Service.Method` name, depending on the protocol).
#[async_trait]
pub trait AppClient: Send + Sync {
    async fn call(&self, target: &str, event: &Event, trace: &TraceContext)
        -> Result<(), RelayError>;
}

/// Builds the client for `protocol` addressing `host:port`.
#[must_use]
pub fn build_client(protocol: ServiceProtocol, host: &str, port: u16) -> Arc<dyn AppClient> {
    match protocol {
        ServiceProtocol::Http => Arc::new(HttpAppClient::new(host, port)),
        ServiceProtocol::Rpc => Arc::new(RpcAppClient::new(host, port)),
        ServiceProtocol::Grpc => Arc::new(GrpcAppClient::new(host, port)),
    }
}

/// Splits `Service.Method` into its two halves.
pub(crate) fn split_method(target: &str) -> Result<(&str, &str), RelayError> {
    target
        .split_once('.')
        .filter(|(service, method)| !service.is_empty() && !method.is_empty())
        .ok_or_else(|| RelayError::Encode(format!("relay target {target} is not Service.Method")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_sidecar_timeout() {
        let err: SidecarError = RelayError::Timeout { timeout_ms: 5000 }.into();
        assert_eq!(err, SidecarError::Timeout { timeout_ms: 5000 });
    }

    #[test]
    fn other_relay_errors_are_internal() {
        let err: SidecarError = RelayError::Transport("refused".into()).into();
        assert!(matches!(err, SidecarError::Internal(_)));
    }

    #[test]
    fn split_method_requires_both_halves() {
        assert_eq!(split_method("Go.A").unwrap(), ("Go", "A"));
        assert!(split_method("GoA").is_err());
        assert!(split_method(".A").is_err());
    }
}
