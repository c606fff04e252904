//! State store abstraction.

use async_trait::async_trait;

use crate::error::CoordinationError;

/// External key/value store used to persist hub state between runs.
///
/// Implementations are consulted opportunistically; the coordination layer
/// keeps working in memory when a call fails.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stores `state` under `key`, replacing any previous value.
    async fn save(&self, key: &str, state: &serde_json::Value) -> Result<(), CoordinationError>;

    /// Loads the value stored under `key`, if any.
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, CoordinationError>;

    /// Removes the value stored under `key`. Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), CoordinationError>;
}
