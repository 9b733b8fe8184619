//! Listener configuration.

use std::time::Duration;

use crate::config::{bind_address, SidecarArgs};

/// Bind addresses for the three inbound transports.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub http_address: String,
    pub rpc_address: String,
    pub grpc_address: String,
    /// Upper bound on an HTTP or gRPC-style request, enforced by tower-http.
    pub request_timeout: Duration,
}

impl NetworkConfig {
    /// Addresses from the parsed arguments. `:port` binds all interfaces.
    #[must_use]
    pub fn from_args(args: &SidecarArgs) -> Self {
        Self {
            http_address: bind_address(&args.http_address),
            rpc_address: bind_address(&args.rpc_address),
            grpc_address: bind_address(&args.grpc_address),
            ..Self::default()
        }
    }
}

impl Default for NetworkConfig {
    /// Loopback with OS-assigned ports.
    fn default() -> Self {
        Self {
            http_address: "127.0.0.1:0".to_string(),
            rpc_address: "127.0.0.1:0".to_string(),
            grpc_address: "127.0.0.1:0".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
