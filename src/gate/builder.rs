//! Builder wiring stores and registries into an [`AdmissionGate`].

use std::sync::Arc;

use crate::config::GateConfig;
use crate::registry::{AssumeLive, BuildRegistry};
use crate::snapshot::{MemoryStore, SnapshotStore};

use super::engine::AdmissionGate;

/// Builder for [`AdmissionGate`].
///
/// Defaults: in-memory store (no durability), [`AssumeLive`] registry (no
/// pruning), default [`GateConfig`].
///
/// ```
/// use stagegate::AdmissionGate;
///
/// let gate = AdmissionGate::builder().build();
/// ```
pub struct GateBuilder {
    config: GateConfig,
    store: Option<Arc<dyn SnapshotStore>>,
    registry: Option<Arc<dyn BuildRegistry>>,
}

impl GateBuilder {
    pub(super) fn new() -> Self {
        Self {
            config: GateConfig::default(),
            store: None,
            registry: None,
        }
    }

    /// Sets the runtime configuration.
    pub fn with_config(mut self, config: GateConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the snapshot store the table persists through.
    pub fn with_store(mut self, store: impl SnapshotStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Sets the snapshot store from an existing shared reference.
    pub fn with_shared_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the build registry consulted by cleanup.
    pub fn with_registry(mut self, registry: impl BuildRegistry + 'static) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Sets the build registry from an existing shared reference.
    pub fn with_shared_registry(mut self, registry: Arc<dyn BuildRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Finishes the gate.
    pub fn build(self) -> AdmissionGate {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let registry = self.registry.unwrap_or_else(|| Arc::new(AssumeLive));
        AdmissionGate::from_parts(&self.config, store, registry)
    }
}
