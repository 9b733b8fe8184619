//! Envelopes for the binary RPC transport and length-prefix framing for the
//! gRPC-style transport.

use serde::{Deserialize, Serialize};

/// One request on the binary RPC transport. `body` is the `MsgPack`-encoded
/// request message for `method`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequestFrame {
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,
    #[serde(default, with = "serde_bytes")]
    pub body: Vec<u8>,
}

/// Reply to an [`RpcRequestFrame`] with the same `id`. `code` follows the
/// shared status table; on failure `body` is an encoded `WireError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponseFrame {
    pub id: u64,
    pub code: u16,
    #[serde(default, with = "serde_bytes")]
    pub body: Vec<u8>,
}

/// Length of the gRPC message prefix: compressed flag plus u32 length.
pub const GRPC_PREFIX_LEN: usize = 5;

/// Wraps a message in the gRPC length-prefixed format (uncompressed).
#[must_use]
pub fn grpc_frame(message: &[u8]) -> Vec<u8> {
    let len = u32::try_from(message.len()).unwrap_or(u32::MAX);
    let mut out = Vec::with_capacity(GRPC_PREFIX_LEN + message.len());
    out.push(0);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(message);
    out
}

/// Extracts the single message from a gRPC length-prefixed body.
///
/// # Errors
///
/// Fails when the prefix is truncated, the compressed flag is set, or the
/// declared length disagrees with the body.
pub fn grpc_unframe(body: &[u8]) -> Result<&[u8], String> {
    if body.len() < GRPC_PREFIX_LEN {
        return Err(format!("grpc frame too short: {} bytes", body.len()));
    }
    if body[0] != 0 {
        return Err("compressed grpc messages are not supported".to_string());
    }
    let declared = u32::from_be_bytes([body[1], body[2], body[3], body[4]]) as usize;
    let message = &body[GRPC_PREFIX_LEN..];
    if message.len() != declared {
        return Err(format!(
            "grpc frame length mismatch: declared {declared}, got {}",
            message.len()
        ));
    }
    Ok(message)
}
