//! Operation names and the message schemas used by the RPC transports.
//!
//! The binary RPC protocol and the gRPC-style protocol address operations by a
//! `Service.Method` string and share the request/response structs in
//! [`schema`]. The HTTP transport maps its routes onto the same [`Method`]
//! values so every transport traces and dispatches identically.

pub mod frame;
pub mod schema;

use std::fmt;
use std::str::FromStr;

pub use frame::{grpc_frame, grpc_unframe, RpcRequestFrame, RpcResponseFrame};
pub use schema::*;

use crate::error::SidecarError;

/// Every operation exposed by the sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    HealthCheck,
    HealthTrace,
    Publish,
    StatePost,
    StateList,
    StateGet,
    StateDelete,
    SecretGet,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::HealthCheck,
        Method::HealthTrace,
        Method::Publish,
        Method::StatePost,
        Method::StateList,
        Method::StateGet,
        Method::StateDelete,
        Method::SecretGet,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HealthCheck => "Health.Check",
            Self::HealthTrace => "Health.Trace",
            Self::Publish => "Publish.Publish",
            Self::StatePost => "State.Post",
            Self::StateList => "State.List",
            Self::StateGet => "State.Get",
            Self::StateDelete => "State.Delete",
            Self::SecretGet => "Secret.Get",
        }
    }

    /// Resolves the gRPC-style path pair `/<service>/<method>`.
    #[must_use]
    pub fn from_path(service: &str, method: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| {
            m.as_str()
                .split_once('.')
                .is_some_and(|(s, n)| s == service && n == method)
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = SidecarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| SidecarError::bad_request(format!("unknown method: {s}")))
    }
}
