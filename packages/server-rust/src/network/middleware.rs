//! tower-http stack for the two HTTP-based listeners.

use axum::body::Body;
use axum::http::header::HeaderName;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use super::config::NetworkConfig;

const REQUEST_ID: &str = "x-request-id";

/// Wraps `router` in, outermost first: request id assignment, a request span
/// tagged with `protocol`, the request timeout (408), and request id echo on
/// the response.
pub fn with_http_layers<S>(router: Router<S>, protocol: &'static str, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID);

    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        let id = request
            .headers()
            .get(REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        info_span!(
            "request",
            protocol,
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %id,
        )
    });

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(trace)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(PropagateRequestIdLayer::new(request_id)),
    )
}
