//! Test state stores — mock `StateStore` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use storyweave_core::error::CoordinationError;
use storyweave_core::store::StateStore;

/// A state store that keeps values in memory and records every `save` and
/// `remove` call.
#[derive(Debug, Default)]
pub struct RecordingStateStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
    saved: Mutex<Vec<(String, serde_json::Value)>>,
    removed: Mutex<Vec<String>>,
}

impl RecordingStateStore {
    /// Creates an empty recording store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all `(key, value)` pairs passed to `save`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved(&self) -> Vec<(String, serde_json::Value)> {
        self.saved.lock().unwrap().clone()
    }

    /// Returns the keys passed to `remove`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for RecordingStateStore {
    async fn save(&self, key: &str, state: &serde_json::Value) -> Result<(), CoordinationError> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_owned(), state.clone());
        self.saved
            .lock()
            .unwrap()
            .push((key.to_owned(), state.clone()));
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, CoordinationError> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<(), CoordinationError> {
        self.values.lock().unwrap().remove(key);
        self.removed.lock().unwrap().push(key.to_owned());
        Ok(())
    }
}

/// A state store that never holds anything and silently accepts writes.
#[derive(Debug)]
pub struct EmptyStateStore;

#[async_trait]
impl StateStore for EmptyStateStore {
    async fn save(&self, _key: &str, _state: &serde_json::Value) -> Result<(), CoordinationError> {
        Ok(())
    }

    async fn load(&self, _key: &str) -> Result<Option<serde_json::Value>, CoordinationError> {
        Ok(None)
    }

    async fn remove(&self, _key: &str) -> Result<(), CoordinationError> {
        Ok(())
    }
}

/// A state store that always returns a persistence error. Useful for testing
/// that persistence faults never escape the hub.
#[derive(Debug)]
pub struct FailingStateStore;

#[async_trait]
impl StateStore for FailingStateStore {
    async fn save(&self, _key: &str, _state: &serde_json::Value) -> Result<(), CoordinationError> {
        Err(CoordinationError::Persistence("connection refused".into()))
    }

    async fn load(&self, _key: &str) -> Result<Option<serde_json::Value>, CoordinationError> {
        Err(CoordinationError::Persistence("connection refused".into()))
    }

    async fn remove(&self, _key: &str) -> Result<(), CoordinationError> {
        Err(CoordinationError::Persistence("connection refused".into()))
    }
}
