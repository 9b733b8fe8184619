//! State facade behaviour over an in-memory store.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use sidecar_core::{Record, RequestContext, SidecarError};
use sidecar_server::backends::MemoryStore;
use sidecar_server::service::{ComponentRegistry, StateFacade};
use sidecar_server::telemetry::{BufferTracer, Tracer};

fn facade() -> StateFacade {
    let mut builder = ComponentRegistry::builder();
    builder.store("s1", Arc::new(MemoryStore::new()));
    let tracer: Arc<dyn Tracer> = Arc::new(BufferTracer::new(256));
    StateFacade::new(Arc::new(builder.build()), tracer)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[tokio::test]
async fn later_save_of_a_key_wins() {
    let state = facade();
    let ctx = RequestContext::background("test");

    state
        .save(&ctx, "s1", &[Record::new("k", b"1".to_vec())])
        .await
        .unwrap();
    state
        .save(&ctx, "s1", &[Record::new("k", b"2".to_vec())])
        .await
        .unwrap();

    let got = state.get(&ctx, "s1", "k").await.unwrap();
    assert_eq!(got, vec![Record::new("k", b"2".to_vec())]);
}

#[tokio::test]
async fn delete_is_idempotent_and_get_then_misses() {
    let state = facade();
    let ctx = RequestContext::background("test");

    state
        .save(&ctx, "s1", &[Record::new("k", b"1".to_vec())])
        .await
        .unwrap();
    state.delete(&ctx, "s1", "k").await.unwrap();
    state.delete(&ctx, "s1", "k").await.unwrap();

    let err = state.get(&ctx, "s1", "k").await.unwrap_err();
    assert!(matches!(err, SidecarError::RecordNotFound { .. }));
    assert!(state.list(&ctx, "s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_store_is_component_not_found() {
    let err = facade()
        .list(&RequestContext::background("test"), "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, SidecarError::ComponentNotFound { .. }));
}

proptest! {
    #[test]
    fn list_reflects_the_last_value_saved_per_key(
        batches in prop::collection::vec(
            prop::collection::vec(("[a-e]", prop::collection::vec(any::<u8>(), 0..8)), 0..6),
            1..5,
        )
    ) {
        let rt = runtime();
        let state = facade();
        let ctx = RequestContext::background("test");
        let mut expected = BTreeMap::new();

        for batch in &batches {
            let records: Vec<Record> = batch
                .iter()
                .map(|(key, value)| Record::new(key.clone(), value.clone()))
                .collect();
            rt.block_on(state.save(&ctx, "s1", &records)).unwrap();
            for record in records {
                expected.insert(record.key, record.value);
            }
        }

        let listed = rt.block_on(state.list(&ctx, "s1")).unwrap();
        let expected: Vec<Record> = expected
            .into_iter()
            .map(|(key, value)| Record::new(key, value))
            .collect();
        prop_assert_eq!(listed, expected);
    }
}
