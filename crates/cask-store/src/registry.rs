use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::NamedBackend;
use crate::error::{StoreError, StoreResult};
use crate::traits::Backend;

/// Name → backend lookup table.
///
/// Populated once at startup and then shared read-only behind an `Arc`.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured backend and register it under its name.
    pub async fn from_configs(configs: &[NamedBackend]) -> StoreResult<Self> {
        let mut registry = Self::new();
        for named in configs {
            let backend = named.backend.build().await?;
            registry.register(named.name.clone(), backend)?;
        }
        Ok(registry)
    }

    /// Register `backend` under `name`. Names are unique.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn Backend>) -> StoreResult<()> {
        let name = name.into();
        if self.backends.contains_key(&name) {
            return Err(StoreError::BackendExists { name });
        }
        info!(backend = %name, kind = backend.kind(), "registered storage backend");
        self.backends.insert(name, backend);
        Ok(())
    }

    pub fn get(&self, name: &str) -> StoreResult<Arc<dyn Backend>> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::BackendNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}
