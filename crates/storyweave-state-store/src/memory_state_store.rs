//! In-process `StateStore`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use storyweave_core::error::CoordinationError;
use storyweave_core::store::StateStore;

/// Keeps state in a map for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, serde_json::Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, key: &str, state: &serde_json::Value) -> Result<(), CoordinationError> {
        self.values().insert(key.to_owned(), state.clone());
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, CoordinationError> {
        Ok(self.values().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), CoordinationError> {
        self.values().remove(key);
        Ok(())
    }
}
