use async_trait::async_trait;
use sidecar_core::messages::grpc_frame;
use sidecar_core::{Event, TraceContext, TRACEPARENT};

use super::{split_method, AppClient, RelayError};
use crate::network::grpc::{GRPC_CONTENT_TYPE, GRPC_MESSAGE, GRPC_STATUS};

/// Posts the event as a framed JSON message to `/<Service>/<Method>`.
/// Success is `grpc-status: 0`.
pub struct GrpcAppClient {
    client: reqwest::Client,
    base_url: String,
}

impl GrpcAppClient {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{host}:{port}"),
        }
    }
}

#[async_trait]
impl AppClient for GrpcAppClient {
    async fn call(
        &self,
        target: &str,
        event: &Event,
        trace: &TraceContext,
    ) -> Result<(), RelayError> {
        let (service, method) = split_method(target)?;
        let message = serde_json::to_vec(event).map_err(|e| RelayError::Encode(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/{service}/{method}", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, GRPC_CONTENT_TYPE)
            .header(TRACEPARENT, trace.to_traceparent())
            .body(grpc_frame(&message))
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let grpc_status = header(GRPC_STATUS);
        let grpc_message = header(GRPC_MESSAGE).unwrap_or_default();

        match grpc_status.as_deref() {
            Some("0") => Ok(()),
            Some(code) => Err(RelayError::Rejected {
                status: code.to_string(),
                detail: grpc_message,
            }),
            None if response.status().is_success() => Ok(()),
            None => Err(RelayError::Rejected {
                status: response.status().as_u16().to_string(),
                detail: grpc_message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use tokio::net::TcpListener;

    use super::*;

    async fn app(router: Router) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, router).await });
        port
    }

    fn grpc_status(code: &'static str, message: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(GRPC_STATUS, HeaderValue::from_static(code));
        headers.insert(GRPC_MESSAGE, HeaderValue::from_static(message));
        headers
    }

    #[tokio::test]
    async fn status_zero_is_success() {
        let router = Router::new().route(
            "/Orders/Created",
            post(|| async { grpc_status("0", "").into_response() }),
        );
        let port = app(router).await;
        GrpcAppClient::new("127.0.0.1", port)
            .call("Orders.Created", &Event::new("orders", b"1".to_vec()), &TraceContext::new_root())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_status_is_rejected() {
        let router = Router::new().route(
            "/Orders/Created",
            post(|| async { grpc_status("13", "broken").into_response() }),
        );
        let port = app(router).await;
        let err = GrpcAppClient::new("127.0.0.1", port)
            .call("Orders.Created", &Event::new("orders", b"1".to_vec()), &TraceContext::new_root())
            .await
            .unwrap_err();
        match err {
            RelayError::Rejected { status, detail } => {
                assert_eq!(status, "13");
                assert_eq!(detail, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn target_without_method_fails_before_sending() {
        let err = GrpcAppClient::new("127.0.0.1", 1)
            .call("Orders", &Event::default(), &TraceContext::new_root())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Encode(_)));
    }
}
