//! Sidecar server: component registry, state/secret/publish facades, relay to
//! the local application, and the HTTP, binary RPC, and gRPC-style transports.

pub mod backends;
pub mod client;
pub mod config;
pub mod network;
pub mod orchestrator;
pub mod service;
pub mod telemetry;
pub mod traits;

pub use config::SidecarArgs;
pub use orchestrator::{RunningSidecar, Sidecar};
pub use traits::{BackendError, Broker, BrokerMessage, MessageStream, SecretStore, Store};
