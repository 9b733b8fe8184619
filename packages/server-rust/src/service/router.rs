//! Operation dispatch: routes each [`OperationRequest`] to the facade that
//! owns it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use sidecar_core::messages::{HealthResponse, TraceResponse};
use sidecar_core::SidecarError;
use tower::Service;

use super::operation::{Operation, OperationRequest, OperationResponse};
use super::publish::PublishFacade;
use super::secret::SecretFacade;
use super::state::StateFacade;
use crate::telemetry::Tracer;

pub(crate) type BoxedFuture =
    Pin<Box<dyn Future<Output = Result<OperationResponse, SidecarError>> + Send>>;

/// Status reported by `Health.Check`.
pub const HEALTH_OK: &str = "ok";

/// The facades shared by every transport.
pub struct Facades {
    pub state: StateFacade,
    pub secret: SecretFacade,
    pub publish: Arc<PublishFacade>,
    pub tracer: Arc<dyn Tracer>,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Innermost service of the pipeline. Cheap to clone; every clone shares the
/// same facades.
#[derive(Clone)]
pub struct Dispatcher {
    facades: Arc<Facades>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(facades: Arc<Facades>) -> Self {
        Self { facades }
    }

    #[must_use]
    pub fn facades(&self) -> &Arc<Facades> {
        &self.facades
    }
}

async fn dispatch(
    facades: Arc<Facades>,
    req: OperationRequest,
) -> Result<OperationResponse, SidecarError> {
    let OperationRequest { ctx, op } = req;
    match op {
        Operation::HealthCheck => Ok(OperationResponse::Health(HealthResponse {
            status: HEALTH_OK.to_string(),
        })),
        Operation::HealthTrace(filter) => {
            let spans = facades.tracer.recent(filter.id.as_deref(), filter.count);
            Ok(OperationResponse::Trace(TraceResponse { spans }))
        }
        Operation::Publish(event) => {
            facades.publish.publish(&ctx, event).await?;
            Ok(OperationResponse::Empty)
        }
        Operation::StatePost { store_id, records } => {
            facades.state.save(&ctx, &store_id, &records).await?;
            Ok(OperationResponse::Empty)
        }
        Operation::StateList { store_id } => facades
            .state
            .list(&ctx, &store_id)
            .await
            .map(OperationResponse::Records),
        Operation::StateGet { store_id, key } => facades
            .state
            .get(&ctx, &store_id, &key)
            .await
            .map(OperationResponse::Records),
        Operation::StateDelete { store_id, key } => {
            facades.state.delete(&ctx, &store_id, &key).await?;
            Ok(OperationResponse::Empty)
        }
        Operation::SecretGet { secret_id, key } => facades
            .secret
            .get(&ctx, &secret_id, &key)
            .await
            .map(OperationResponse::Secret),
    }
}

impl Service<OperationRequest> for Dispatcher {
    type Response = OperationResponse;
    type Error = SidecarError;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: OperationRequest) -> Self::Future {
        Box::pin(dispatch(Arc::clone(&self.facades), req))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
