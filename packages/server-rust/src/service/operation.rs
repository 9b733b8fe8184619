//! Typed operations dispatched through the pipeline.
//!
//! Every transport decodes its wire request into an [`Operation`], wraps it
//! in an [`OperationRequest`] with the request context, and gets back an
//! [`OperationResponse`] or a [`SidecarError`].

use sidecar_core::messages::{HealthResponse, TraceRequest, TraceResponse};
use sidecar_core::{Event, Method, Record, RequestContext, Secret, SidecarError};

/// One decoded sidecar operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    HealthCheck,
    HealthTrace(TraceRequest),
    Publish(Event),
    StatePost { store_id: String, records: Vec<Record> },
    StateList { store_id: String },
    StateGet { store_id: String, key: String },
    StateDelete { store_id: String, key: String },
    SecretGet { secret_id: String, key: String },
}

impl Operation {
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::HealthCheck => Method::HealthCheck,
            Self::HealthTrace(_) => Method::HealthTrace,
            Self::Publish(_) => Method::Publish,
            Self::StatePost { .. } => Method::StatePost,
            Self::StateList { .. } => Method::StateList,
            Self::StateGet { .. } => Method::StateGet,
            Self::StateDelete { .. } => Method::StateDelete,
            Self::SecretGet { .. } => Method::SecretGet,
        }
    }

    /// Rejects operations missing an addressing field. Runs as part of
    /// decoding, before anything is dispatched.
    ///
    /// # Errors
    ///
    /// `BadRequest` naming the missing field.
    pub fn validate(&self) -> Result<(), SidecarError> {
        let require = |value: &str, field: &str| {
            if value.is_empty() {
                Err(SidecarError::bad_request(format!("{field} is required")))
            } else {
                Ok(())
            }
        };
        match self {
            Self::HealthCheck | Self::HealthTrace(_) | Self::Publish(_) => Ok(()),
            Self::StatePost { store_id, .. } | Self::StateList { store_id } => {
                require(store_id, "storeId")
            }
            Self::StateGet { store_id, key } | Self::StateDelete { store_id, key } => {
                require(store_id, "storeId")?;
                require(key, "key")
            }
            Self::SecretGet { secret_id, key } => {
                require(secret_id, "secretId")?;
                require(key, "key")
            }
        }
    }

    /// Span metadata describing the operation's target.
    #[must_use]
    pub fn metadata(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::HealthCheck => Vec::new(),
            Self::HealthTrace(req) => req
                .id
                .iter()
                .map(|id| ("traceId", id.clone()))
                .collect(),
            Self::Publish(event) => vec![("eventName", event.event_name.clone())],
            Self::StatePost { store_id, records } => vec![
                ("storeId", store_id.clone()),
                ("records", records.len().to_string()),
            ],
            Self::StateList { store_id } => vec![("storeId", store_id.clone())],
            Self::StateGet { store_id, key } | Self::StateDelete { store_id, key } => {
                vec![("storeId", store_id.clone()), ("key", key.clone())]
            }
            Self::SecretGet { secret_id, key } => {
                vec![("secretId", secret_id.clone()), ("key", key.clone())]
            }
        }
    }
}

/// An operation plus the context it runs in.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub ctx: RequestContext,
    pub op: Operation,
}

impl OperationRequest {
    #[must_use]
    pub fn new(ctx: RequestContext, op: Operation) -> Self {
        Self { ctx, op }
    }
}

/// Successful result of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResponse {
    Health(HealthResponse),
    Trace(TraceResponse),
    Records(Vec<Record>),
    Secret(Secret),
    Empty,
}
