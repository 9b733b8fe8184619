//! Binary RPC transport: length-delimited `MsgPack` envelopes over TCP.
//!
//! Each connection carries a sequence of [`RpcRequestFrame`]s, answered in
//! order with [`RpcResponseFrame`]s bearing the same id.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use sidecar_core::messages::{RpcRequestFrame, RpcResponseFrame};
use sidecar_core::{Method, SidecarError};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, warn};

use super::adapter::{Adapter, Codec};
use super::message::{decode_operation, encode_error, encode_result, MsgPack};
use super::shutdown::shutdown_signalled;
use crate::service::{Operation, OperationResponse};

pub struct RpcCodec;

impl Codec for RpcCodec {
    const PROTOCOL: &'static str = "rpc";
    type Payload = Vec<u8>;
    /// Response code and encoded body.
    type Reply = (u16, Vec<u8>);

    fn decode(&self, method: Method, body: Vec<u8>) -> Result<Operation, SidecarError> {
        decode_operation::<MsgPack>(method, &body)
    }

    fn encode(&self, result: Result<OperationResponse, SidecarError>) -> (u16, Vec<u8>) {
        let (status, body) = encode_result::<MsgPack>(&result);
        (status.code(), body)
    }
}

type RpcState = Arc<Adapter<RpcCodec>>;

/// Accepts connections until shutdown, then waits for open connections to
/// finish their current request.
///
/// # Errors
///
/// Currently infallible once bound; accept errors are logged and skipped.
pub async fn serve(
    listener: TcpListener,
    adapter: RpcState,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown_signalled(&mut shutdown) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(
                        stream,
                        peer,
                        Arc::clone(&adapter),
                        shutdown.clone(),
                    ));
                }
                Err(e) => warn!(error = %e, "rpc accept failed"),
            },
            // Reap finished connections so the set does not grow unbounded.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    while connections.join_next().await.is_some() {}
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    adapter: RpcState,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(peer = %peer, "rpc connection opened");
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    loop {
        let frame = tokio::select! {
            () = shutdown_signalled(&mut shutdown) => break,
            frame = framed.next() => frame,
        };
        let bytes = match frame {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                warn!(peer = %peer, error = %e, "rpc frame error, closing connection");
                break;
            }
            None => break,
        };

        let reply = handle_frame(&adapter, &bytes).await;
        let encoded = match rmp_serde::to_vec_named(&reply) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(peer = %peer, error = %e, "failed to encode rpc reply");
                break;
            }
        };
        if let Err(e) = framed.send(Bytes::from(encoded)).await {
            warn!(peer = %peer, error = %e, "failed to write rpc reply");
            break;
        }
    }
    debug!(peer = %peer, "rpc connection closed");
}

async fn handle_frame(adapter: &RpcState, bytes: &[u8]) -> RpcResponseFrame {
    let request: RpcRequestFrame = match rmp_serde::from_slice(bytes) {
        Ok(request) => request,
        Err(e) => {
            return reject(0, &SidecarError::bad_request(format!("malformed rpc frame: {e}")));
        }
    };
    let traceparent = request.traceparent.as_deref();
    let (code, body) = match Method::from_str(&request.method) {
        Ok(method) => adapter.handle(method, traceparent, request.body).await,
        Err(e) => adapter.reject(&request.method, traceparent, e),
    };
    RpcResponseFrame {
        id: request.id,
        code,
        body,
    }
}

fn reject(id: u64, err: &SidecarError) -> RpcResponseFrame {
    RpcResponseFrame {
        id,
        code: err.status().code(),
        body: encode_error::<MsgPack>(&err.to_wire()),
    }
}
