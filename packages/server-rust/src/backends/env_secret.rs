//! [`SecretStore`] reading process environment variables.

use std::collections::BTreeMap;

use anyhow::anyhow;
use async_trait::async_trait;
use sidecar_core::Secret;

use crate::traits::{BackendError, SecretStore};

/// Resolves secret `key` from the variable `<prefix><key>`.
pub struct EnvSecretStore {
    prefix: String,
}

impl EnvSecretStore {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, key: &str) -> Result<Secret, BackendError> {
        let var = format!("{}{key}", self.prefix);
        let value = std::env::var(&var)
            .map_err(|e| BackendError::Other(anyhow!("secret {var} unavailable: {e}")))?;

        let mut data = BTreeMap::new();
        data.insert(key.to_string(), value);
        Ok(Secret {
            key: key.to_string(),
            data,
        })
    }
}
