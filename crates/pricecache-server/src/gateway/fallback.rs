//! Static fallback values per projection kind.

use std::collections::HashMap;

use pricecache_core::{CoreError, ProjectionKind};
use serde_json::Value;

/// Values served when neither the source nor a stale copy is available.
#[derive(Debug, Clone, Default)]
pub struct FallbackRegistry {
    values: HashMap<ProjectionKind, Value>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from configuration, keyed by kind name.
    pub fn from_config(entries: &HashMap<String, Value>) -> Result<Self, CoreError> {
        let mut registry = Self::new();
        for (kind, value) in entries {
            registry.register(kind.parse()?, value.clone());
        }
        Ok(registry)
    }

    /// Registers (or replaces) the fallback for a kind.
    pub fn register(&mut self, kind: ProjectionKind, value: Value) -> &mut Self {
        self.values.insert(kind, value);
        self
    }

    pub fn with(mut self, kind: ProjectionKind, value: Value) -> Self {
        self.register(kind, value);
        self
    }

    pub fn get(&self, kind: ProjectionKind) -> Option<&Value> {
        self.values.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
