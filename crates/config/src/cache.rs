//! Configuration cache keyed by source identity
//!
//! Entries never expire. Callers must invalidate after persisting a change.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::settings::Configuration;

#[derive(Default)]
pub struct ConfigCache {
    entries: RwLock<HashMap<String, Arc<Configuration>>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached configuration for `key`, loading it on a miss.
    ///
    /// A failed load leaves the cache unchanged.
    pub fn get_or_load<E, F>(&self, key: &str, loader: F) -> Result<Arc<Configuration>, E>
    where
        F: FnOnce() -> Result<Configuration, E>,
    {
        if let Some(config) = self.get(key) {
            return Ok(config);
        }

        let loaded = Arc::new(loader()?);
        let mut entries = self.entries.write();
        // Another caller may have populated the entry while we were loading
        let entry = entries.entry(key.to_string()).or_insert(loaded);
        tracing::debug!(key, "Cached configuration");
        Ok(Arc::clone(entry))
    }

    pub fn get(&self, key: &str) -> Option<Arc<Configuration>> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, config: Configuration) -> Arc<Configuration> {
        let config = Arc::new(config);
        self.entries.write().insert(key.into(), Arc::clone(&config));
        config
    }

    /// Drop one entry; returns whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            tracing::debug!(key, "Invalidated cached configuration");
        }
        removed
    }

    pub fn invalidate_all(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
