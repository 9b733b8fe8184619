use std::sync::Arc;

use sidecar_core::{RequestContext, Secret, SidecarError};

use super::registry::ComponentRegistry;
use crate::telemetry::{ActiveSpan, Tracer};

/// Read-only secret lookups. Every call goes to the backend; nothing is cached.
pub struct SecretFacade {
    registry: Arc<ComponentRegistry>,
    tracer: Arc<dyn Tracer>,
}

impl SecretFacade {
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry>, tracer: Arc<dyn Tracer>) -> Self {
        Self { registry, tracer }
    }

    /// # Errors
    ///
    /// `ComponentNotFound` for an unknown secret store, `Internal` when the
    /// backend cannot produce the secret.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        secret_id: &str,
        key: &str,
    ) -> Result<Secret, SidecarError> {
        let secrets = self.registry.secret_store(secret_id)?;

        let mut span = ActiveSpan::start(Arc::clone(&self.tracer), "secret.get", Some(&ctx.trace));
        span.add_metadata("secretId", secret_id);
        span.add_metadata("key", key);

        let result = secrets.get(key).await.map_err(|e| {
            SidecarError::internal(format!(
                "failed to retrieve secret from store {secret_id} and key {key}: {e}"
            ))
        });
        span.record_result(&result);
        result
    }
}

#[cfg(test)]
mod tests {
    use sidecar_core::ComponentKind;

    use super::*;
    use crate::backends::EnvSecretStore;
    use crate::telemetry::BufferTracer;

    fn facade() -> SecretFacade {
        let mut builder = ComponentRegistry::builder();
        builder.secret_store("env", Arc::new(EnvSecretStore::new("")));
        SecretFacade::new(Arc::new(builder.build()), Arc::new(BufferTracer::new(8)))
    }

    #[tokio::test]
    async fn reads_from_registered_store() {
        let ctx = RequestContext::background("test");
        let secret = facade().get(&ctx, "env", "PATH").await.unwrap();
        assert_eq!(secret.key, "PATH");
        assert!(secret.data.contains_key("PATH"));
    }

    #[tokio::test]
    async fn unknown_store_is_not_found() {
        let ctx = RequestContext::background("test");
        let err = facade().get(&ctx, "ssm", "PATH").await.unwrap_err();
        assert_eq!(err, SidecarError::component_not_found(ComponentKind::Secret, "ssm"));
    }

    #[tokio::test]
    async fn missing_key_is_internal() {
        let ctx = RequestContext::background("test");
        let err = facade()
            .get(&ctx, "env", "SIDECAR_SECRET_THAT_DOES_NOT_EXIST_91f2")
            .await
            .unwrap_err();
        assert!(matches!(err, SidecarError::Internal(_)));
    }
}
