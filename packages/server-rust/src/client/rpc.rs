use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use sidecar_core::messages::{RpcRequestFrame, RpcResponseFrame};
use sidecar_core::{Event, TraceContext, WireError, WireStatus};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::{AppClient, RelayError};

/// Sends the event as one `MsgPack` request frame over a fresh TCP
/// connection. Success is response code 2xx.
pub struct RpcAppClient {
    address: String,
    next_id: AtomicU64,
}

impl RpcAppClient {
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            address: format!("{host}:{port}"),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl AppClient for RpcAppClient {
    async fn call(
        &self,
        target: &str,
        event: &Event,
        trace: &TraceContext,
    ) -> Result<(), RelayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequestFrame {
            id,
            method: target.to_string(),
            traceparent: Some(trace.to_traceparent()),
            body: rmp_serde::to_vec_named(event).map_err(|e| RelayError::Encode(e.to_string()))?,
        };
        let bytes =
            rmp_serde::to_vec_named(&request).map_err(|e| RelayError::Encode(e.to_string()))?;

        let stream = TcpStream::connect(&self.address)
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        framed
            .send(Bytes::from(bytes))
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let reply = framed
            .next()
            .await
            .ok_or_else(|| RelayError::Transport("connection closed before reply".to_string()))?
            .map_err(|e| RelayError::Transport(e.to_string()))?;
        let response: RpcResponseFrame = rmp_serde::from_slice(&reply)
            .map_err(|e| RelayError::Transport(format!("malformed reply: {e}")))?;

        if response.id != id {
            return Err(RelayError::Transport(format!(
                "reply id {} does not match request id {id}",
                response.id
            )));
        }
        if WireStatus::from_code(response.code).is_success() {
            return Ok(());
        }
        let detail = rmp_serde::from_slice::<WireError>(&response.body)
            .map(|e| e.detail)
            .unwrap_or_default();
        Err(RelayError::Rejected {
            status: response.code.to_string(),
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    /// Answers one request with `code`, echoing the request id.
    async fn app(code: u16) -> (u16, tokio::task::JoinHandle<RpcRequestFrame>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
            let bytes = framed.next().await.unwrap().unwrap();
            let request: RpcRequestFrame = rmp_serde::from_slice(&bytes).unwrap();
            let body = if code == 200 {
                Vec::new()
            } else {
                rmp_serde::to_vec_named(&WireError::new(WireStatus::from_code(code), "boom")).unwrap()
            };
            let reply = RpcResponseFrame {
                id: request.id,
                code,
                body,
            };
            framed
                .send(Bytes::from(rmp_serde::to_vec_named(&reply).unwrap()))
                .await
                .unwrap();
            request
        });
        (port, handle)
    }

    #[tokio::test]
    async fn delivers_event_with_method_and_traceparent() {
        let (port, app) = app(200).await;
        let client = RpcAppClient::new("127.0.0.1", port);
        let trace = TraceContext::new_root();
        client
            .call("Orders.Created", &Event::new("orders.created", b"{}".to_vec()), &trace)
            .await
            .unwrap();

        let request = app.await.unwrap();
        assert_eq!(request.method, "Orders.Created");
        assert_eq!(request.traceparent, Some(trace.to_traceparent()));
        let event: Event = rmp_serde::from_slice(&request.body).unwrap();
        assert_eq!(event.event_name, "orders.created");
    }

    #[tokio::test]
    async fn error_code_is_rejected_with_detail() {
        let (port, _app) = app(500).await;
        let err = RpcAppClient::new("127.0.0.1", port)
            .call("Orders.Created", &Event::default(), &TraceContext::new_root())
            .await
            .unwrap_err();
        match err {
            RelayError::Rejected { status, detail } => {
                assert_eq!(status, "500");
                assert_eq!(detail, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_app_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = RpcAppClient::new("127.0.0.1", port)
            .call("Orders.Created", &Event::default(), &TraceContext::new_root())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
    }
}
