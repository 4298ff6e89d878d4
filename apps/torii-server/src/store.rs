//! In-memory store adapter.
//!
//! A stand-in so the gateway runs standalone. A real deployment injects an
//! adapter over its consensus-backed store instead; nothing here persists
//! across restarts.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use torii_gateway::StoreAdapter;

/// Thread-safe in-memory key-value map.
#[derive(Default)]
pub struct MemStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl StoreAdapter for MemStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.data.write().remove(key);
        Ok(())
    }
}
