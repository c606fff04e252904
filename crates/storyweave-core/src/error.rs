//! Coordination error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the coordination layer.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// A subscriber handler reported a failure.
    #[error("handler error: {0}")]
    Handler(String),

    /// A staged change id did not match any pending change.
    #[error("pending change not found: {0}")]
    ChangeNotFound(Uuid),

    /// The external state store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// State could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CoordinationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
