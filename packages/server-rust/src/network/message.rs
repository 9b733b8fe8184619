//! Conversion between the RPC message schemas and operations.
//!
//! The binary RPC and gRPC-style transports carry the same request and
//! response structs and differ only in how a struct becomes bytes, which is
//! what [`MessageFormat`] abstracts.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sidecar_core::messages::{
    DeleteStateRequest, GetSecretRequest, GetSecretResponse, GetStateRequest, HealthRequest,
    ListStateRequest, PostStateRequest, PublishRequest, PublishResponse, StateResponse,
    TraceRequest,
};
use sidecar_core::{Method, SidecarError, WireError, WireStatus};

use crate::service::{Operation, OperationResponse};

pub trait MessageFormat {
    /// # Errors
    ///
    /// Returns the decoder's message when `body` is not a valid `T`.
    fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, String>;

    /// # Errors
    ///
    /// Returns the encoder's message when `value` cannot be written.
    fn write<T: Serialize>(value: &T) -> Result<Vec<u8>, String>;
}

/// JSON, for the gRPC-style transport.
pub struct Json;

impl MessageFormat for Json {
    fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, String> {
        serde_json::from_slice(body).map_err(|e| e.to_string())
    }

    fn write<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
        serde_json::to_vec(value).map_err(|e| e.to_string())
    }
}

/// `MsgPack` with named fields, for the binary RPC transport.
pub struct MsgPack;

impl MessageFormat for MsgPack {
    fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, String> {
        rmp_serde::from_slice(body).map_err(|e| e.to_string())
    }

    fn write<T: Serialize>(value: &T) -> Result<Vec<u8>, String> {
        rmp_serde::to_vec_named(value).map_err(|e| e.to_string())
    }
}

/// An empty body is the request struct's default, so argument-less calls
/// such as `Health.Check` may omit it.
fn parse_or_default<F: MessageFormat, T: DeserializeOwned + Default>(
    body: &[u8],
) -> Result<T, SidecarError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    F::parse(body).map_err(|e| SidecarError::bad_request(format!("failed to decode request: {e}")))
}

/// Decodes the request message of `method`.
///
/// # Errors
///
/// `BadRequest` for a malformed message or a publish without an event.
pub fn decode_operation<F: MessageFormat>(
    method: Method,
    body: &[u8],
) -> Result<Operation, SidecarError> {
    let op = match method {
        Method::HealthCheck => {
            parse_or_default::<F, HealthRequest>(body)?;
            Operation::HealthCheck
        }
        Method::HealthTrace => Operation::HealthTrace(parse_or_default::<F, TraceRequest>(body)?),
        Method::Publish => {
            let req = parse_or_default::<F, PublishRequest>(body)?;
            let event = req
                .event
                .ok_or_else(|| SidecarError::bad_request("expected an event to publish"))?;
            Operation::Publish(event)
        }
        Method::StatePost => {
            let req = parse_or_default::<F, PostStateRequest>(body)?;
            Operation::StatePost {
                store_id: req.store_id,
                records: req.records,
            }
        }
        Method::StateList => Operation::StateList {
            store_id: parse_or_default::<F, ListStateRequest>(body)?.store_id,
        },
        Method::StateGet => {
            let req = parse_or_default::<F, GetStateRequest>(body)?;
            Operation::StateGet {
                store_id: req.store_id,
                key: req.key,
            }
        }
        Method::StateDelete => {
            let req = parse_or_default::<F, DeleteStateRequest>(body)?;
            Operation::StateDelete {
                store_id: req.store_id,
                key: req.key,
            }
        }
        Method::SecretGet => {
            let req = parse_or_default::<F, GetSecretRequest>(body)?;
            Operation::SecretGet {
                secret_id: req.secret_id,
                key: req.key,
            }
        }
    };
    Ok(op)
}

/// Encodes the response message for a successful call, or the wire error.
#[must_use]
pub fn encode_result<F: MessageFormat>(
    result: &Result<OperationResponse, SidecarError>,
) -> (WireStatus, Vec<u8>) {
    let encoded = match result {
        Ok(OperationResponse::Health(health)) => F::write(health),
        Ok(OperationResponse::Trace(trace)) => F::write(trace),
        Ok(OperationResponse::Records(records)) => F::write(&StateResponse {
            records: records.clone(),
        }),
        Ok(OperationResponse::Secret(secret)) => F::write(&GetSecretResponse {
            secret: secret.clone(),
        }),
        // Publish, State.Post and State.Delete all answer with an empty message.
        Ok(OperationResponse::Empty) => F::write(&PublishResponse {}),
        Err(err) => return (err.status(), encode_error::<F>(&err.to_wire())),
    };
    match encoded {
        Ok(body) => (WireStatus::Ok, body),
        Err(e) => {
            let err = SidecarError::internal(format!("failed to encode response: {e}"));
            (err.status(), encode_error::<F>(&err.to_wire()))
        }
    }
}

/// Encodes a wire error; falls back to an empty body if even that fails.
#[must_use]
pub fn encode_error<F: MessageFormat>(error: &WireError) -> Vec<u8> {
    F::write(error).unwrap_or_default()
}
