//! HTTP+JSON transport.
//!
//! Routes:
//! - `GET /health/check`
//! - `GET /health/trace?id&count`
//! - `POST /publish` (body: event)
//! - `POST /state/{storeId}` (body: array of records), `GET /state/{storeId}`
//! - `GET|DELETE /state/{storeId}/{key}`
//! - `GET /secret/{secretId}/{key}`
//!
//! Record and span lists are bare JSON arrays; failures are the wire error
//! shape with the HTTP status equal to its code.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use sidecar_core::messages::TraceRequest;
use sidecar_core::{Event, Method, Record, SidecarError, WireStatus, TRACEPARENT};

use super::adapter::{Adapter, Codec};
use super::config::NetworkConfig;
use super::middleware::with_http_layers;
use crate::service::{Operation, OperationResponse};

/// Everything an HTTP handler extracted for one request.
#[derive(Debug, Default)]
pub struct HttpRequest {
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpRequest {
    fn param(&self, name: &str) -> String {
        self.params.get(name).cloned().unwrap_or_default()
    }

    fn json_body<T: serde::de::DeserializeOwned>(&self, missing: &str) -> Result<T, SidecarError> {
        if self.body.is_empty() {
            return Err(SidecarError::bad_request(missing));
        }
        serde_json::from_slice(&self.body)
            .map_err(|e| SidecarError::bad_request(format!("failed to decode request: {e}")))
    }

    fn trace_filter(&self) -> Result<TraceRequest, SidecarError> {
        let id = self.query.get("id").filter(|id| !id.is_empty()).cloned();
        let count = self
            .query
            .get("count")
            .filter(|c| !c.is_empty())
            .map(|c| {
                c.parse::<usize>()
                    .map_err(|e| SidecarError::bad_request(format!("invalid count {c:?}: {e}")))
            })
            .transpose()?;
        Ok(TraceRequest { id, count })
    }
}

pub struct HttpCodec;

impl Codec for HttpCodec {
    const PROTOCOL: &'static str = "http";
    type Payload = HttpRequest;
    type Reply = Response;

    fn decode(&self, method: Method, req: HttpRequest) -> Result<Operation, SidecarError> {
        let op = match method {
            Method::HealthCheck => Operation::HealthCheck,
            Method::HealthTrace => Operation::HealthTrace(req.trace_filter()?),
            Method::Publish => {
                let event: Event = req.json_body("expected a body as event")?;
                Operation::Publish(event)
            }
            Method::StatePost => Operation::StatePost {
                store_id: req.param("storeId"),
                records: req.json_body::<Vec<Record>>("expected a body as array of records")?,
            },
            Method::StateList => Operation::StateList {
                store_id: req.param("storeId"),
            },
            Method::StateGet => Operation::StateGet {
                store_id: req.param("storeId"),
                key: req.param("key"),
            },
            Method::StateDelete => Operation::StateDelete {
                store_id: req.param("storeId"),
                key: req.param("key"),
            },
            Method::SecretGet => Operation::SecretGet {
                secret_id: req.param("secretId"),
                key: req.param("key"),
            },
        };
        Ok(op)
    }

    fn encode(&self, result: Result<OperationResponse, SidecarError>) -> Response {
        match result {
            Ok(OperationResponse::Health(health)) => Json(health).into_response(),
            Ok(OperationResponse::Trace(trace)) => Json(trace.spans).into_response(),
            Ok(OperationResponse::Records(records)) => Json(records).into_response(),
            Ok(OperationResponse::Secret(secret)) => Json(secret).into_response(),
            Ok(OperationResponse::Empty) => Json(json!({})).into_response(),
            Err(err) => error_response(&err),
        }
    }
}

/// Renders a failure as the wire error with a matching status code.
#[must_use]
pub fn error_response(err: &SidecarError) -> Response {
    let status = status_code(err.status());
    (status, Json(err.to_wire())).into_response()
}

fn status_code(status: WireStatus) -> StatusCode {
    StatusCode::from_u16(status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn traceparent(headers: &HeaderMap) -> Option<&str> {
    headers.get(TRACEPARENT).and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

type HttpState = Arc<Adapter<HttpCodec>>;

/// Assembles the HTTP router over `adapter`.
pub fn build_router(adapter: HttpState, config: &NetworkConfig) -> Router {
    let routes: Router<HttpState> = Router::new()
        .route("/health/check", get(health_check))
        .route("/health/trace", get(health_trace))
        .route("/publish", post(publish))
        .route("/state/{storeId}", post(state_post).get(state_list))
        .route("/state/{storeId}/{key}", get(state_get).delete(state_delete))
        .route("/secret/{secretId}/{key}", get(secret_get));
    with_http_layers(routes, HttpCodec::PROTOCOL, config).with_state(adapter)
}

async fn invoke(adapter: &HttpState, method: Method, headers: &HeaderMap, req: HttpRequest) -> Response {
    adapter.handle(method, traceparent(headers), req).await
}

async fn health_check(State(adapter): State<HttpState>, headers: HeaderMap) -> Response {
    invoke(&adapter, Method::HealthCheck, &headers, HttpRequest::default()).await
}

async fn health_trace(
    State(adapter): State<HttpState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let req = HttpRequest {
        query,
        ..HttpRequest::default()
    };
    invoke(&adapter, Method::HealthTrace, &headers, req).await
}

async fn publish(State(adapter): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    let req = HttpRequest {
        body,
        ..HttpRequest::default()
    };
    invoke(&adapter, Method::Publish, &headers, req).await
}

async fn state_post(
    State(adapter): State<HttpState>,
    Path(params): Path<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let req = HttpRequest {
        params,
        body,
        ..HttpRequest::default()
    };
    invoke(&adapter, Method::StatePost, &headers, req).await
}

async fn with_params(
    adapter: &HttpState,
    method: Method,
    headers: &HeaderMap,
    params: HashMap<String, String>,
) -> Response {
    let req = HttpRequest {
        params,
        ..HttpRequest::default()
    };
    invoke(adapter, method, headers, req).await
}

async fn state_list(
    State(adapter): State<HttpState>,
    Path(params): Path<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    with_params(&adapter, Method::StateList, &headers, params).await
}

async fn state_get(
    State(adapter): State<HttpState>,
    Path(params): Path<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    with_params(&adapter, Method::StateGet, &headers, params).await
}

async fn state_delete(
    State(adapter): State<HttpState>,
    Path(params): Path<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    with_params(&adapter, Method::StateDelete, &headers, params).await
}

async fn secret_get(
    State(adapter): State<HttpState>,
    Path(params): Path<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    with_params(&adapter, Method::SecretGet, &headers, params).await
}
