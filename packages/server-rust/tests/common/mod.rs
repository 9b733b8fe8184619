//! Helpers shared by the integration tests: start a sidecar on ephemeral
//! ports and speak each of its three protocols.

#![allow(dead_code)]

use std::net::SocketAddr;

use bytes::Bytes;
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use sidecar_core::messages::{grpc_frame, grpc_unframe, RpcRequestFrame, RpcResponseFrame};
use sidecar_server::service::ComponentRegistry;
use sidecar_server::{RunningSidecar, Sidecar, SidecarArgs};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub fn args(extra: &[&str]) -> SidecarArgs {
    let mut argv = vec![
        "sidecar",
        "--http-address",
        "127.0.0.1:0",
        "--rpc-address",
        "127.0.0.1:0",
        "--grpc-address",
        "127.0.0.1:0",
    ];
    argv.extend_from_slice(extra);
    SidecarArgs::try_parse_from(argv).expect("valid test arguments")
}

pub async fn start(extra: &[&str]) -> RunningSidecar {
    Sidecar::build(&args(extra))
        .await
        .expect("sidecar builds")
        .start()
        .await
        .expect("sidecar starts")
}

/// Starts a sidecar over `registry` instead of configured backends.
pub async fn start_with_registry(extra: &[&str], registry: ComponentRegistry) -> RunningSidecar {
    Sidecar::with_registry(&args(extra), registry)
        .expect("sidecar builds")
        .start()
        .await
        .expect("sidecar starts")
}

pub async fn http_json(
    method: reqwest::Method,
    addr: SocketAddr,
    path: &str,
    body: Option<serde_json::Value>,
) -> (u16, serde_json::Value) {
    let client = reqwest::Client::new();
    let mut request = client.request(method, format!("http://{addr}{path}"));
    if let Some(body) = body {
        request = request.json(&body);
    }
    read_json(request.send().await.expect("http request")).await
}

/// Sends `body` as is, so malformed JSON reaches the sidecar.
pub async fn http_raw(
    method: reqwest::Method,
    addr: SocketAddr,
    path: &str,
    body: Vec<u8>,
) -> (u16, serde_json::Value) {
    let response = reqwest::Client::new()
        .request(method, format!("http://{addr}{path}"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .expect("http request");
    read_json(response).await
}

async fn read_json(response: reqwest::Response) -> (u16, serde_json::Value) {
    let status = response.status().as_u16();
    let text = response.text().await.expect("http body");
    let value = if text.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    };
    (status, value)
}

pub struct RpcConnection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    next_id: u64,
}

impl RpcConnection {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("rpc connect");
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
            next_id: 1,
        }
    }

    /// Sends one request and returns the response code and `MsgPack` body.
    pub async fn call<T: Serialize>(&mut self, method: &str, body: &T) -> (u16, Vec<u8>) {
        let body = rmp_serde::to_vec_named(body).expect("encode body");
        self.call_raw(method, body).await
    }

    /// Like [`RpcConnection::call`] with an already encoded body.
    pub async fn call_raw(&mut self, method: &str, body: Vec<u8>) -> (u16, Vec<u8>) {
        let id = self.next_id;
        self.next_id += 1;
        let frame = RpcRequestFrame {
            id,
            method: method.to_string(),
            traceparent: None,
            body,
        };
        self.framed
            .send(Bytes::from(rmp_serde::to_vec_named(&frame).expect("encode frame")))
            .await
            .expect("rpc send");
        let reply = self.framed.next().await.expect("rpc reply").expect("rpc frame");
        let reply: RpcResponseFrame = rmp_serde::from_slice(&reply).expect("decode reply");
        assert_eq!(reply.id, id);
        (reply.code, reply.body)
    }
}

/// Calls `/<Service>/<Method>` and returns the `grpc-status` code and the
/// unframed JSON message.
pub async fn grpc_call<T: Serialize>(addr: SocketAddr, path: &str, message: &T) -> (u32, Vec<u8>) {
    let message = serde_json::to_vec(message).expect("encode message");
    grpc_call_raw(addr, path, &message).await
}

/// Like [`grpc_call`] with an already encoded message.
pub async fn grpc_call_raw(addr: SocketAddr, path: &str, message: &[u8]) -> (u32, Vec<u8>) {
    let body = grpc_frame(message);
    let response = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .header(reqwest::header::CONTENT_TYPE, "application/grpc+json")
        .body(body)
        .send()
        .await
        .expect("grpc request");
    assert_eq!(response.status().as_u16(), 200);
    let code = response.headers()["grpc-status"]
        .to_str()
        .expect("ascii status")
        .parse()
        .expect("numeric status");
    let bytes = response.bytes().await.expect("grpc body");
    (code, grpc_unframe(&bytes).expect("framed reply").to_vec())
}
