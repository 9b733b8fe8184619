//! gRPC-style transport: `POST /<Service>/<Method>` carrying one
//! length-prefixed JSON message.
//!
//! Status travels in the `grpc-status` / `grpc-message` response headers.
//! The HTTP status is always 200 once a method has been resolved, as in gRPC.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use sidecar_core::messages::{grpc_frame, grpc_unframe};
use sidecar_core::{Method, SidecarError, WireStatus};

use super::adapter::{Adapter, Codec};
use super::config::NetworkConfig;
use super::http::traceparent;
use super::message::{decode_operation, encode_result, Json};
use super::middleware::with_http_layers;
use crate::service::{Operation, OperationResponse};

pub const GRPC_CONTENT_TYPE: &str = "application/grpc+json";
pub const GRPC_STATUS: &str = "grpc-status";
pub const GRPC_MESSAGE: &str = "grpc-message";

pub struct GrpcCodec;

impl Codec for GrpcCodec {
    const PROTOCOL: &'static str = "grpc";
    type Payload = Bytes;
    type Reply = Response;

    fn decode(&self, method: Method, body: Bytes) -> Result<Operation, SidecarError> {
        let message = grpc_unframe(&body).map_err(SidecarError::bad_request)?;
        decode_operation::<Json>(method, message)
    }

    fn encode(&self, result: Result<OperationResponse, SidecarError>) -> Response {
        let detail = result.as_ref().err().map(ToString::to_string);
        let (status, body) = encode_result::<Json>(&result);
        grpc_response(status, detail.as_deref().unwrap_or_default(), &body)
    }
}

fn grpc_response(status: WireStatus, message: &str, body: &[u8]) -> Response {
    let mut response = Response::new(Body::from(grpc_frame(body)));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(GRPC_CONTENT_TYPE));
    headers.insert(GRPC_STATUS, HeaderValue::from(status.grpc_code()));
    if !message.is_empty() {
        headers.insert(GRPC_MESSAGE, header_safe(message));
    }
    response
}

/// Header values must be visible ASCII; anything else is replaced.
fn header_safe(message: &str) -> HeaderValue {
    let cleaned: String = message
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .collect();
    HeaderValue::from_str(&cleaned).unwrap_or_else(|_| HeaderValue::from_static("error"))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

type GrpcState = Arc<Adapter<GrpcCodec>>;

pub fn build_router(adapter: GrpcState, config: &NetworkConfig) -> Router {
    let routes: Router<GrpcState> = Router::new().route("/{service}/{method}", post(call));
    with_http_layers(routes, GrpcCodec::PROTOCOL, config).with_state(adapter)
}

async fn call(
    State(adapter): State<GrpcState>,
    Path((service, name)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(method) = Method::from_path(&service, &name) else {
        let name = format!("{service}.{name}");
        let err = SidecarError::bad_request(format!("unknown method: {name}"));
        return adapter.reject(&name, traceparent(&headers), err);
    };
    adapter.handle(method, traceparent(&headers), body).await
}
