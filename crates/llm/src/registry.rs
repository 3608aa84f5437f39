//! Provider Registry
//!
//! Maps provider ids to adapters. Populated once at startup, then shared
//! read-only behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use content_engine_core::ProviderAdapter;

/// Provider adapter registry
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own provider id
    pub fn register<A: ProviderAdapter>(&mut self, adapter: A) {
        self.register_arc(Arc::new(adapter));
    }

    /// Register a shared adapter
    pub fn register_arc(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let id = adapter.provider_id().to_string();
        if self.adapters.insert(id.clone(), adapter).is_some() {
            tracing::warn!(provider = %id, "Replaced previously registered adapter");
        }
    }

    /// Builder-style registration
    pub fn with<A: ProviderAdapter>(mut self, adapter: A) -> Self {
        self.register(adapter);
        self
    }

    /// Get adapter by provider id
    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider_id).cloned()
    }

    /// Check if a provider is registered
    pub fn has(&self, provider_id: &str) -> bool {
        self.adapters.contains_key(provider_id)
    }

    /// Registered provider ids, sorted
    pub fn provider_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_ids())
            .finish()
    }
}
