//! Backend capability traits.
//!
//! Facades only ever see these traits; concrete backends live in
//! [`crate::backends`] and are selected by configuration at startup.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use sidecar_core::{Record, Secret};

/// Failure reported by a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The store holds nothing under the requested key.
    #[error("record not found: {key}")]
    RecordNotFound { key: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Keyed record persistence.
/// Implementations: memory, `PostgreSQL`/`CockroachDB` (feature `postgres`).
#[async_trait]
pub trait Store: Send + Sync {
    /// Upserts every record. Cross-record atomicity is up to the backend.
    async fn save(&self, records: &[Record]) -> Result<(), BackendError>;

    /// All records in the store; empty when the store is empty.
    async fn list(&self) -> Result<Vec<Record>, BackendError>;

    /// The record under `key`, or [`BackendError::RecordNotFound`].
    async fn get(&self, key: &str) -> Result<Record, BackendError>;

    /// Removes the record under `key`. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

/// A message as carried by a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

impl BrokerMessage {
    #[must_use]
    pub fn new(topic: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            body,
            headers: BTreeMap::new(),
        }
    }
}

/// Stream of deliveries for one consumer group. Ends when the broker closes
/// the subscription.
pub type MessageStream = BoxStream<'static, Result<BrokerMessage, BackendError>>;

/// Publish/subscribe transport.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, message: BrokerMessage) -> Result<(), BackendError>;

    /// Opens the delivery stream for `group`.
    async fn subscribe(&self, group: &str) -> Result<MessageStream, BackendError>;

    async fn unsubscribe(&self, group: &str) -> Result<(), BackendError>;
}

/// Read-only secret lookup.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Secret, BackendError>;
}
