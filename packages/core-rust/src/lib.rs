//! Sidecar core: domain types, error taxonomy, trace context, and wire schemas.
//!
//! Everything in this crate is transport-independent: the server crate builds
//! its HTTP, binary RPC, and gRPC-style adapters on top of these types so the
//! three protocols share one vocabulary and one status table.

pub mod context;
pub mod error;
pub mod messages;
pub mod opaque;
pub mod trace;
pub mod types;

pub use context::RequestContext;
pub use error::{ComponentKind, SidecarError, WireError, WireStatus};
pub use messages::Method;
pub use trace::{SpanRecord, SpanStatus, TraceContext, TRACEPARENT};
pub use types::{Event, Record, Secret};
