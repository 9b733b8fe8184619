//! Inbound transports, the shared adapter, and shutdown control.

pub mod adapter;
pub mod config;
pub mod grpc;
pub mod http;
pub mod message;
pub mod middleware;
pub mod module;
pub mod rpc;
pub mod shutdown;

pub use adapter::{Adapter, Codec};
pub use config::NetworkConfig;
pub use module::{BoundAddresses, NetworkModule, RunningListeners};
pub use shutdown::{InFlightGuard, ListenerState, ShutdownController};
