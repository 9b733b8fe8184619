//! Per-operation timing and outcome, recorded on a `tracing` span.
//!
//! Server-side failures log at `warn`; successes and caller errors (400/404)
//! log at `debug` so a busy sidecar does not drown its own log.

use std::task::{Context, Poll};
use std::time::Instant;

use futures_util::future::BoxFuture;
use sidecar_core::{SidecarError, WireStatus};
use tower::{Layer, Service};
use tracing::{debug, field, info_span, warn, Instrument};

use crate::service::operation::{OperationRequest, OperationResponse};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<OperationRequest> for MetricsService<S>
where
    S: Service<OperationRequest, Response = OperationResponse, Error = SidecarError>,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = SidecarError;
    type Future = BoxFuture<'static, Result<OperationResponse, SidecarError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: OperationRequest) -> Self::Future {
        let method = req.op.method();
        let span = info_span!(
            "operation",
            method = method.as_str(),
            origin = req.ctx.origin,
            trace_id = %req.ctx.trace.trace_id,
            duration_ms = field::Empty,
            outcome = field::Empty,
        );
        let recorder = span.clone();
        let started = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(
            async move {
                let result = fut.await;
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let status = match &result {
                    Ok(_) => WireStatus::Ok,
                    Err(e) => e.status(),
                };
                recorder.record("duration_ms", elapsed_ms);
                recorder.record("outcome", status.reason());

                match &result {
                    Err(e) if status == WireStatus::Internal => {
                        warn!(%method, elapsed_ms, error = %e, "operation failed");
                    }
                    _ => debug!(%method, elapsed_ms, outcome = status.reason(), "operation complete"),
                }
                result
            }
            .instrument(span),
        )
    }
}
