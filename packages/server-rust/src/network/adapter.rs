//! Protocol-independent request handling.
//!
//! Each transport supplies a [`Codec`] that turns its wire payload into an
//! [`Operation`] and renders the outcome back. [`Adapter`] does everything
//! else identically for all of them: the `<protocol>.<Method>` span, decode
//! failures as `BadRequest`, the pipeline call, and closing the span.

use std::sync::Arc;

use sidecar_core::{Method, RequestContext, SidecarError, TraceContext};
use tower::ServiceExt;

use super::shutdown::ShutdownController;
use crate::service::{Operation, OperationRequest, OperationResponse, Pipeline};
use crate::telemetry::{ActiveSpan, Tracer};

/// Wire format of one transport.
pub trait Codec: Send + Sync + 'static {
    /// Protocol label used in span names and request contexts.
    const PROTOCOL: &'static str;

    /// What the listener hands over for one request.
    type Payload: Send;
    /// What the listener writes back.
    type Reply: Send;

    /// # Errors
    ///
    /// `BadRequest` when the payload does not describe a valid `method` call.
    fn decode(&self, method: Method, payload: Self::Payload) -> Result<Operation, SidecarError>;

    fn encode(&self, result: Result<OperationResponse, SidecarError>) -> Self::Reply;
}

pub struct Adapter<C> {
    codec: C,
    pipeline: Pipeline,
    tracer: Arc<dyn Tracer>,
    shutdown: Arc<ShutdownController>,
}

impl<C: Codec> Adapter<C> {
    #[must_use]
    pub fn new(
        codec: C,
        pipeline: Pipeline,
        tracer: Arc<dyn Tracer>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            codec,
            pipeline,
            tracer,
            shutdown,
        }
    }

    /// Handles one call of `method`. `traceparent` is the caller's W3C trace
    /// header, if it sent one.
    pub async fn handle(
        &self,
        method: Method,
        traceparent: Option<&str>,
        payload: C::Payload,
    ) -> C::Reply {
        let _in_flight = self.shutdown.in_flight_guard();

        let parent = traceparent.and_then(TraceContext::from_traceparent);
        let mut span = ActiveSpan::start(
            Arc::clone(&self.tracer),
            &format!("{}.{}", C::PROTOCOL, method.as_str()),
            parent.as_ref(),
        );

        let result = self.execute(&span, method, payload).await;
        span.record_result(&result);
        span.finish();

        self.codec.encode(result)
    }

    /// Answers a call whose method name did not resolve. The failure is
    /// still traced as `<protocol>.<name>`.
    pub fn reject(&self, name: &str, traceparent: Option<&str>, err: SidecarError) -> C::Reply {
        let parent = traceparent.and_then(TraceContext::from_traceparent);
        let mut span = ActiveSpan::start(
            Arc::clone(&self.tracer),
            &format!("{}.{name}", C::PROTOCOL),
            parent.as_ref(),
        );
        span.fail(&err.to_string());
        span.finish();

        self.codec.encode(Err(err))
    }

    async fn execute(
        &self,
        span: &ActiveSpan,
        method: Method,
        payload: C::Payload,
    ) -> Result<OperationResponse, SidecarError> {
        let op = self.codec.decode(method, payload)?;
        op.validate()?;
        for (key, value) in op.metadata() {
            span.add_metadata(key, &value);
        }

        let ctx = RequestContext::new(span.context().clone(), C::PROTOCOL);
        self.pipeline
            .clone()
            .oneshot(OperationRequest::new(ctx, op))
            .await
    }
}
