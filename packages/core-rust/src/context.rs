use crate::trace::TraceContext;

/// Per-request context threaded from a transport adapter through the facades
/// into backend calls.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The span that owns the current call. Nested work opens child spans
    /// under it so every span of a request shares one trace id.
    pub trace: TraceContext,
    /// Protocol that received the request (`"http"`, `"rpc"`, `"grpc"`),
    /// or `"relay"` for broker deliveries.
    pub origin: &'static str,
}

impl RequestContext {
    #[must_use]
    pub fn new(trace: TraceContext, origin: &'static str) -> Self {
        Self { trace, origin }
    }

    /// A context with a fresh root trace, for calls that originate inside the
    /// sidecar (tests, startup checks).
    #[must_use]
    pub fn background(origin: &'static str) -> Self {
        Self::new(TraceContext::new_root(), origin)
    }
}
