//! Component registry: backends keyed by capability kind and id.
//!
//! Built once at startup through [`ComponentRegistryBuilder`] and read-only
//! afterwards. Lookups of an unregistered id fail with a 404-class
//! [`SidecarError::ComponentNotFound`].

use std::collections::HashMap;
use std::sync::Arc;

use sidecar_core::{ComponentKind, SidecarError};
use tracing::{info, warn};

use crate::traits::{Broker, SecretStore, Store};

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A backend instance tagged with its capability kind.
#[derive(Clone)]
pub enum Component {
    Store(Arc<dyn Store>),
    Broker(Arc<dyn Broker>),
    Secret(Arc<dyn SecretStore>),
}

impl Component {
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Store(_) => ComponentKind::Store,
            Self::Broker(_) => ComponentKind::Broker,
            Self::Secret(_) => ComponentKind::Secret,
        }
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Component::{:?}", self.kind())
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistryBuilder
// ---------------------------------------------------------------------------

/// Collects components during startup. [`build`](Self::build) freezes them
/// into an immutable [`ComponentRegistry`].
#[derive(Default)]
pub struct ComponentRegistryBuilder {
    components: HashMap<(ComponentKind, String), Component>,
}

impl ComponentRegistryBuilder {
    /// Registers `component` under `id` within its kind. A second registration
    /// of the same kind and id replaces the first.
    pub fn register(&mut self, id: impl Into<String>, component: Component) -> &mut Self {
        let id = id.into();
        let kind = component.kind();
        if self
            .components
            .insert((kind, id.clone()), component)
            .is_some()
        {
            warn!(kind = %kind, id = %id, "component registered twice, keeping the latest");
        }
        self
    }

    pub fn store(&mut self, id: impl Into<String>, store: Arc<dyn Store>) -> &mut Self {
        self.register(id, Component::Store(store))
    }

    pub fn broker(&mut self, id: impl Into<String>, broker: Arc<dyn Broker>) -> &mut Self {
        self.register(id, Component::Broker(broker))
    }

    pub fn secret_store(&mut self, id: impl Into<String>, secret: Arc<dyn SecretStore>) -> &mut Self {
        self.register(id, Component::Secret(secret))
    }

    #[must_use]
    pub fn build(self) -> ComponentRegistry {
        let registry = ComponentRegistry {
            components: self.components,
        };
        info!(
            stores = registry.ids(ComponentKind::Store).len(),
            brokers = registry.ids(ComponentKind::Broker).len(),
            secrets = registry.ids(ComponentKind::Secret).len(),
            "component registry ready"
        );
        registry
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Backend instances keyed by `(kind, id)`. Immutable once built, so lookups
/// need no synchronization.
pub struct ComponentRegistry {
    components: HashMap<(ComponentKind, String), Component>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            components: HashMap::new(),
        }
    }

    /// # Errors
    ///
    /// Returns [`SidecarError::ComponentNotFound`] if nothing is registered
    /// under `(kind, id)`.
    pub fn resolve(&self, kind: ComponentKind, id: &str) -> Result<Component, SidecarError> {
        self.components
            .get(&(kind, id.to_string()))
            .cloned()
            .ok_or_else(|| SidecarError::component_not_found(kind, id))
    }

    /// # Errors
    ///
    /// Returns [`SidecarError::ComponentNotFound`] for an unknown store id.
    pub fn store(&self, id: &str) -> Result<Arc<dyn Store>, SidecarError> {
        match self.resolve(ComponentKind::Store, id)? {
            Component::Store(store) => Ok(store),
            _ => Err(SidecarError::component_not_found(ComponentKind::Store, id)),
        }
    }

    /// # Errors
    ///
    /// Returns [`SidecarError::ComponentNotFound`] for an unknown broker id.
    pub fn broker(&self, id: &str) -> Result<Arc<dyn Broker>, SidecarError> {
        match self.resolve(ComponentKind::Broker, id)? {
            Component::Broker(broker) => Ok(broker),
            _ => Err(SidecarError::component_not_found(ComponentKind::Broker, id)),
        }
    }

    /// # Errors
    ///
    /// Returns [`SidecarError::ComponentNotFound`] for an unknown secret store id.
    pub fn secret_store(&self, id: &str) -> Result<Arc<dyn SecretStore>, SidecarError> {
        match self.resolve(ComponentKind::Secret, id)? {
            Component::Secret(secret) => Ok(secret),
            _ => Err(SidecarError::component_not_found(ComponentKind::Secret, id)),
        }
    }

    /// Registered ids of one kind, sorted.
    #[must_use]
    pub fn ids(&self, kind: ComponentKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .components
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
