//! Pipeline composition: wraps the dispatcher in the middleware stack.

use tower::ServiceBuilder;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::router::Dispatcher;

/// The service every transport adapter calls. Clone it per request.
pub type Pipeline = MetricsService<Dispatcher>;

/// Build the operation pipeline by wrapping the `Dispatcher` with middleware layers.
///
/// The only layer is `MetricsLayer`. Per-call deadlines live on the relay
/// path, not on inbound operations.
#[must_use]
pub fn build_operation_pipeline(dispatcher: Dispatcher) -> Pipeline {
    ServiceBuilder::new().layer(MetricsLayer).service(dispatcher)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
