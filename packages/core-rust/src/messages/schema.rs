//! Request and response messages for the RPC transports.
//!
//! All structs use `#[serde(rename_all = "camelCase")]`. On the binary RPC
//! transport they are encoded with `rmp_serde::to_vec_named()`; on the
//! gRPC-style transport they are JSON.

use serde::{Deserialize, Serialize};

use crate::trace::SpanRecord;
use crate::types::{Event, Record, Secret};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Filters for `Health.Trace`. `id` selects a single trace; `count` caps the
/// number of most recent spans returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceResponse {
    pub spans: Vec<SpanRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub event: Option<Event>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostStateRequest {
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostStateResponse {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStateRequest {
    #[serde(default)]
    pub store_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStateRequest {
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStateRequest {
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStateResponse {}

/// Response of `State.List` and `State.Get`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResponse {
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSecretRequest {
    #[serde(default)]
    pub secret_id: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSecretResponse {
    pub secret: Secret,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn post_state_request_json_shape() {
        let req: PostStateRequest = serde_json::from_value(json!({
            "storeId": "s1",
            "records": [{ "key": "k1", "value": "v1" }]
        }))
        .unwrap();
        assert_eq!(req.store_id, "s1");
        assert_eq!(req.records, vec![Record::new("k1", br#""v1""#.to_vec())]);
    }

    #[test]
    fn post_state_request_msgpack_named() {
        let req = PostStateRequest {
            store_id: "s1".into(),
            records: vec![Record::new("k1", vec![1, 2, 3])],
        };
        let bytes = rmp_serde::to_vec_named(&req).unwrap();
        let back: PostStateRequest = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn publish_request_without_event() {
        let req: PublishRequest = serde_json::from_str("{}").unwrap();
        assert!(req.event.is_none());
    }

    #[test]
    fn trace_request_fields_are_optional() {
        let req: TraceRequest = serde_json::from_str(r#"{"count": 3}"#).unwrap();
        assert_eq!(req.count, Some(3));
        assert!(req.id.is_none());
    }
}
