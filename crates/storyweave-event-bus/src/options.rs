//! Emission, subscription and batch options.

use std::sync::Arc;

use storyweave_core::entity::EntityType;
use storyweave_core::event::{CoordinationEvent, EventType, Priority};
use storyweave_core::payload::BaseEventPayload;
use uuid::Uuid;

/// Per-emission options.
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Dispatch priority tier.
    pub priority: Priority,
    /// Coalesce emissions sharing this key into the last one per quiet period.
    pub debounce_key: Option<String>,
    /// Quiet period for this key; defaults to the bus setting.
    pub debounce_ms: Option<u64>,
    /// Explicit batch tag.
    pub batch_id: Option<Uuid>,
    /// Skip duplicate suppression (used for undo/redo replays).
    pub bypass_dedup: bool,
}

impl EmitOptions {
    /// Options with the given priority.
    #[must_use]
    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    /// Options that debounce on `key`.
    pub fn debounced(key: impl Into<String>) -> Self {
        Self {
            debounce_key: Some(key.into()),
            ..Self::default()
        }
    }
}

/// Subscription filters and ordering.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Only deliver events about these entity types.
    pub entity_types: Option<Vec<EntityType>>,
    /// Only deliver events for this project.
    pub project_id: Option<String>,
    /// Higher values run first.
    pub priority: i32,
    /// Name used in logs.
    pub label: Option<String>,
}

impl SubscribeOptions {
    /// Options carrying only a label.
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }
}

/// One emission inside [`EventBus::emit_batch`](crate::EventBus::emit_batch).
#[derive(Debug, Clone)]
pub struct BatchEntry {
    /// What happened.
    pub event_type: EventType,
    /// The caller-supplied payload.
    pub payload: BaseEventPayload,
    /// Emission options; any explicit batch id is replaced.
    pub options: EmitOptions,
}

/// Reported once every event of a closed batch has left the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// The batch identifier.
    pub batch_id: Uuid,
    /// Dispatched event ids, in dispatch order.
    pub event_ids: Vec<Uuid>,
}

/// Invoked with the fully built event when the bus accepts it into the queue.
pub type AcceptHook = Box<dyn FnOnce(&CoordinationEvent) + Send>;

/// Invoked when a batch completes.
pub type BatchCallback = Arc<dyn Fn(&BatchSummary) + Send + Sync>;
