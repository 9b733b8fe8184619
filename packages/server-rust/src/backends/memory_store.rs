//! In-memory [`Store`] backed by [`DashMap`].

use async_trait::async_trait;
use dashmap::DashMap;
use sidecar_core::Record;

use crate::traits::{BackendError, Store};

/// Record store held entirely in process memory. Contents are lost on exit.
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save(&self, records: &[Record]) -> Result<(), BackendError> {
        for record in records {
            self.entries.insert(record.key.clone(), record.value.clone());
        }
        Ok(())
    }

    /// Records sorted by key.
    async fn list(&self) -> Result<Vec<Record>, BackendError> {
        let mut records: Vec<Record> = self
            .entries
            .iter()
            .map(|entry| Record::new(entry.key().clone(), entry.value().clone()))
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn get(&self, key: &str) -> Result<Record, BackendError> {
        self.entries
            .get(key)
            .map(|value| Record::new(key, value.clone()))
            .ok_or_else(|| BackendError::RecordNotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.entries.remove(key);
        Ok(())
    }
}
