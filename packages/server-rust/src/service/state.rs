//! State facade: uniform keyed-record operations over registered stores.

use std::sync::Arc;

use sidecar_core::{Record, RequestContext, SidecarError};

use super::registry::ComponentRegistry;
use crate::telemetry::{ActiveSpan, Tracer};
use crate::traits::BackendError;

pub struct StateFacade {
    registry: Arc<ComponentRegistry>,
    tracer: Arc<dyn Tracer>,
}

impl StateFacade {
    #[must_use]
    pub fn new(registry: Arc<ComponentRegistry>, tracer: Arc<dyn Tracer>) -> Self {
        Self { registry, tracer }
    }

    /// Upserts `records` into store `store_id`.
    ///
    /// # Errors
    ///
    /// `ComponentNotFound` for an unknown store, `Internal` on backend failure.
    pub async fn save(
        &self,
        ctx: &RequestContext,
        store_id: &str,
        records: &[Record],
    ) -> Result<(), SidecarError> {
        let store = self.registry.store(store_id)?;
        let mut span = self.child_span(ctx, "store.save", store_id);
        span.add_metadata("records", &records.len().to_string());
        let result = store
            .save(records)
            .await
            .map_err(|e| backend_error(e, store_id));
        span.record_result(&result);
        result
    }

    /// # Errors
    ///
    /// `ComponentNotFound` for an unknown store, `Internal` on backend failure.
    pub async fn list(
        &self,
        ctx: &RequestContext,
        store_id: &str,
    ) -> Result<Vec<Record>, SidecarError> {
        let store = self.registry.store(store_id)?;
        let mut span = self.child_span(ctx, "store.list", store_id);
        let result = store.list().await.map_err(|e| backend_error(e, store_id));
        span.record_result(&result);
        result
    }

    /// Returns the record under `key` as a one-element list.
    ///
    /// # Errors
    ///
    /// `ComponentNotFound` for an unknown store, `RecordNotFound` for an
    /// absent key, `Internal` on backend failure.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        store_id: &str,
        key: &str,
    ) -> Result<Vec<Record>, SidecarError> {
        let store = self.registry.store(store_id)?;
        let mut span = self.child_span(ctx, "store.get", store_id);
        span.add_metadata("key", key);
        let result = store
            .get(key)
            .await
            .map(|record| vec![record])
            .map_err(|e| backend_error(e, store_id));
        span.record_result(&result);
        result
    }

    /// Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// `ComponentNotFound` for an unknown store, `Internal` on backend failure.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        store_id: &str,
        key: &str,
    ) -> Result<(), SidecarError> {
        let store = self.registry.store(store_id)?;
        let mut span = self.child_span(ctx, "store.delete", store_id);
        span.add_metadata("key", key);
        let result = store
            .delete(key)
            .await
            .map_err(|e| backend_error(e, store_id));
        span.record_result(&result);
        result
    }

    fn child_span(&self, ctx: &RequestContext, name: &str, store_id: &str) -> ActiveSpan {
        let span = ActiveSpan::start(Arc::clone(&self.tracer), name, Some(&ctx.trace));
        span.add_metadata("storeId", store_id);
        span
    }
}

fn backend_error(err: BackendError, store_id: &str) -> SidecarError {
    match err {
        BackendError::RecordNotFound { key } => SidecarError::RecordNotFound {
            store_id: store_id.to_string(),
            key,
        },
        BackendError::Other(e) => {
            SidecarError::internal(format!("store {store_id} failed: {e:#}"))
        }
    }
}
