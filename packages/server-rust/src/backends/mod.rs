//! Concrete backends and the factory that builds the component registry from
//! configuration.
//!
//! - [`memory_store`]: `DashMap` record store
//! - [`memory_broker`]: in-process pub/sub over a shared bus
//! - [`env_secret`]: secrets from environment variables
//! - `postgres_store`: `PostgreSQL`/`CockroachDB` record store (feature `postgres`)

pub mod env_secret;
pub mod memory_broker;
pub mod memory_store;
#[cfg(feature = "postgres")]
pub mod postgres_store;

use std::sync::Arc;

use anyhow::bail;
use tracing::info;

pub use env_secret::EnvSecretStore;
pub use memory_broker::{MemoryBroker, MemoryBus};
pub use memory_store::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres_store::PostgresStore;

use crate::config::SidecarArgs;
use crate::service::registry::{ComponentRegistry, ComponentRegistryBuilder};
use crate::traits::Store;

// ---------------------------------------------------------------------------
// Backend kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Postgres,
}

impl StoreKind {
    /// `Ok(None)` for an empty kind (stores not configured).
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown kind, or a relational kind when the
    /// `postgres` feature is not compiled in.
    pub fn parse(kind: &str) -> anyhow::Result<Option<Self>> {
        match kind {
            "" => Ok(None),
            "memory" => Ok(Some(Self::Memory)),
            "cockroach" | "postgres" if cfg!(feature = "postgres") => Ok(Some(Self::Postgres)),
            "cockroach" | "postgres" => {
                bail!("store kind {kind} requires the `postgres` feature")
            }
            other => bail!("unsupported store kind: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Memory,
}

impl BrokerKind {
    /// # Errors
    ///
    /// Returns an error for an unknown kind.
    pub fn parse(kind: &str) -> anyhow::Result<Option<Self>> {
        match kind {
            "" => Ok(None),
            "memory" => Ok(Some(Self::Memory)),
            other => bail!("unsupported broker kind: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Env,
}

impl SecretKind {
    /// # Errors
    ///
    /// Returns an error for an unknown kind.
    pub fn parse(kind: &str) -> anyhow::Result<Option<Self>> {
        match kind {
            "" => Ok(None),
            "env" => Ok(Some(Self::Env)),
            other => bail!("unsupported secret kind: {other}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Builds every configured backend and freezes them into a registry.
///
/// Stores get one instance per configured store id. Brokers get one instance
/// per producer topic and per consumer group, all sharing `bus`. The secret
/// store is registered under its kind name.
///
/// # Errors
///
/// Fails on an unsupported backend kind or a backend that cannot connect.
/// Nothing is listening yet when this runs.
pub async fn build_registry(
    args: &SidecarArgs,
    bus: Arc<MemoryBus>,
) -> anyhow::Result<ComponentRegistry> {
    let store_kind = StoreKind::parse(&args.store)?;
    let broker_kind = BrokerKind::parse(&args.broker)?;
    let secret_kind = SecretKind::parse(&args.secret)?;

    let mut builder = ComponentRegistry::builder();

    if let Some(kind) = store_kind {
        for id in args.store_ids() {
            let store = make_store(kind, args, &id).await?;
            builder.store(id, store);
        }
    }

    if let Some(BrokerKind::Memory) = broker_kind {
        register_memory_brokers(&mut builder, &bus, &args.producer_topics());
        register_memory_brokers(&mut builder, &bus, &args.consumer_groups());
    }

    if let Some(SecretKind::Env) = secret_kind {
        builder.secret_store(&args.secret, Arc::new(EnvSecretStore::new(&args.secret_prefix)));
    }

    info!(
        store = %args.store,
        broker = %args.broker,
        secret = %args.secret,
        "backends configured"
    );
    Ok(builder.build())
}

fn register_memory_brokers(builder: &mut ComponentRegistryBuilder, bus: &Arc<MemoryBus>, ids: &[String]) {
    for id in ids {
        builder.broker(id, Arc::new(MemoryBroker::new(Arc::clone(bus), id)));
    }
}

#[cfg_attr(not(feature = "postgres"), allow(clippy::unused_async))]
async fn make_store(kind: StoreKind, args: &SidecarArgs, id: &str) -> anyhow::Result<Arc<dyn Store>> {
    match kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "postgres")]
        StoreKind::Postgres => Ok(Arc::new(
            PostgresStore::connect(&args.store_address, &args.db, id).await?,
        )),
        #[cfg(not(feature = "postgres"))]
        StoreKind::Postgres => bail!(
            "store {id} of kind {} requires the `postgres` feature",
            args.store
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::Parser;
    use sidecar_core::ComponentKind;

    use super::*;

    fn args(extra: &[&str]) -> SidecarArgs {
        let mut argv = vec!["sidecar"];
        argv.extend_from_slice(extra);
        SidecarArgs::try_parse_from(argv).unwrap()
    }

    #[tokio::test]
    async fn builds_memory_components() {
        let args = args(&[
            "--store", "memory", "--stores", "s1,s2",
            "--broker", "memory", "--producers", "topicA", "--consumers", "orders",
            "--secret", "env",
        ]);
        let registry = build_registry(&args, Arc::new(MemoryBus::new())).await.unwrap();

        assert_eq!(registry.ids(ComponentKind::Store), vec!["s1", "s2"]);
        assert_eq!(registry.ids(ComponentKind::Broker), vec!["orders", "topicA"]);
        assert_eq!(registry.ids(ComponentKind::Secret), vec!["env"]);
    }

    #[tokio::test]
    async fn empty_kinds_register_nothing() {
        let args = args(&["--stores", "s1", "--producers", "topicA"]);
        let registry = build_registry(&args, Arc::new(MemoryBus::new())).await.unwrap();
        assert!(registry.ids(ComponentKind::Store).is_empty());
        assert!(registry.ids(ComponentKind::Broker).is_empty());
    }

    #[tokio::test]
    async fn unknown_kind_is_fatal() {
        let args = args(&["--broker", "kafka"]);
        let err = build_registry(&args, Arc::new(MemoryBus::new()))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("unsupported broker kind"));
    }

    #[test]
    fn kind_parsing() {
        assert_eq!(StoreKind::parse("memory").unwrap(), Some(StoreKind::Memory));
        assert_eq!(StoreKind::parse("").unwrap(), None);
        assert!(StoreKind::parse("redis").is_err());
        assert_eq!(SecretKind::parse("env").unwrap(), Some(SecretKind::Env));
        assert!(SecretKind::parse("ssm").is_err());
    }
}
