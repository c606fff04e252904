//! Coordination configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML document,
//! then `STORYWEAVE_*` environment overrides.

use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;

/// Prefix for environment overrides, e.g. `STORYWEAVE_DEBOUNCE_MS`.
pub const ENV_PREFIX: &str = "STORYWEAVE_";

/// Tunables shared by the event bus, the dependency graph and the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Quiet period before a debounced emission is queued.
    pub debounce_ms: u64,
    /// How long a content hash suppresses identical emissions.
    pub hash_expiration_ms: u64,
    /// Queue capacity before the oldest half is dropped.
    pub max_event_queue_size: usize,
    /// Re-entrant drain depth at which the queue is abandoned.
    pub max_processing_depth: usize,
    /// Depth bound for dependent traversal during impact analysis.
    pub max_traversal_depth: usize,
    /// Bound on each of the undo and redo stacks.
    pub max_undo_history: usize,
    /// Bound on the activity log.
    pub max_activity_log_size: usize,
    /// Entries per undo/redo stack kept when persisting.
    pub persisted_history_size: usize,
    /// Activity log entries kept when persisting.
    pub persisted_activity_size: usize,
    /// Whether `save_state`/`load_state` talk to the state store.
    pub enable_persistence: bool,
    /// Key the hub state is stored under.
    pub persistence_key: String,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            hash_expiration_ms: 5000,
            max_event_queue_size: 1000,
            max_processing_depth: 10,
            max_traversal_depth: 10,
            max_undo_history: 50,
            max_activity_log_size: 200,
            persisted_history_size: 20,
            persisted_activity_size: 50,
            enable_persistence: false,
            persistence_key: "storyweave:coordination-state".to_owned(),
        }
    }
}

impl CoordinationConfig {
    /// Parses a YAML document. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::Config` if the document is malformed.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoordinationError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| CoordinationError::Config(format!("invalid configuration document: {e}")))
    }

    /// Applies `STORYWEAVE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::Config` if an override cannot be parsed.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, CoordinationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        override_parsed(&mut self.debounce_ms, "DEBOUNCE_MS", var("DEBOUNCE_MS"))?;
        override_parsed(
            &mut self.hash_expiration_ms,
            "HASH_EXPIRATION_MS",
            var("HASH_EXPIRATION_MS"),
        )?;
        override_parsed(
            &mut self.max_event_queue_size,
            "MAX_EVENT_QUEUE_SIZE",
            var("MAX_EVENT_QUEUE_SIZE"),
        )?;
        override_parsed(
            &mut self.max_processing_depth,
            "MAX_PROCESSING_DEPTH",
            var("MAX_PROCESSING_DEPTH"),
        )?;
        override_parsed(
            &mut self.max_traversal_depth,
            "MAX_TRAVERSAL_DEPTH",
            var("MAX_TRAVERSAL_DEPTH"),
        )?;
        override_parsed(
            &mut self.max_undo_history,
            "MAX_UNDO_HISTORY",
            var("MAX_UNDO_HISTORY"),
        )?;
        override_parsed(
            &mut self.max_activity_log_size,
            "MAX_ACTIVITY_LOG_SIZE",
            var("MAX_ACTIVITY_LOG_SIZE"),
        )?;
        override_parsed(
            &mut self.persisted_history_size,
            "PERSISTED_HISTORY_SIZE",
            var("PERSISTED_HISTORY_SIZE"),
        )?;
        override_parsed(
            &mut self.persisted_activity_size,
            "PERSISTED_ACTIVITY_SIZE",
            var("PERSISTED_ACTIVITY_SIZE"),
        )?;
        override_parsed(
            &mut self.enable_persistence,
            "ENABLE_PERSISTENCE",
            var("ENABLE_PERSISTENCE"),
        )?;
        if let Some(key) = var("PERSISTENCE_KEY") {
            self.persistence_key = key;
        }

        Ok(self)
    }

    /// Loads configuration from an optional YAML document plus overrides.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::Config` if either layer is invalid.
    pub fn load<F>(yaml: Option<&str>, lookup: F) -> Result<Self, CoordinationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match yaml {
            Some(doc) => Self::from_yaml_str(doc)?,
            None => Self::default(),
        };
        base.apply_overrides(lookup)
    }

    /// Loads configuration using the process environment for overrides.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::Config` if either layer is invalid.
    pub fn from_env(yaml: Option<&str>) -> Result<Self, CoordinationError> {
        Self::load(yaml, |name| std::env::var(name).ok())
    }
}

fn override_parsed<T>(
    slot: &mut T,
    name: &str,
    raw: Option<String>,
) -> Result<(), CoordinationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = raw {
        *slot = raw.trim().parse().map_err(|e| {
            CoordinationError::Config(format!("{ENV_PREFIX}{name} must be valid: {e}"))
        })?;
    }
    Ok(())
}
