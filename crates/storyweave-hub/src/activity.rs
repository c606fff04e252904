//! Activity log — a bounded, human-readable audit trail.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyweave_core::entity::EntityType;
use storyweave_core::event::{CoordinationEvent, EventType};

/// What produced an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Emit,
    Undo,
    Redo,
    Stage,
    Execute,
    Cancel,
    Reset,
}

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
}

impl ActivityEntry {
    /// An entry describing `event`.
    #[must_use]
    pub fn for_event(kind: ActivityKind, event: &CoordinationEvent, timestamp: DateTime<Utc>) -> Self {
        let verb = match kind {
            ActivityKind::Emit => "emitted",
            ActivityKind::Undo => "undid",
            ActivityKind::Redo => "redid",
            ActivityKind::Stage => "staged",
            ActivityKind::Execute => "executed",
            ActivityKind::Cancel => "cancelled",
            ActivityKind::Reset => "reset",
        };
        Self {
            timestamp,
            kind,
            event_type: Some(event.event_type),
            description: format!(
                "{verb} {} for {} {}",
                event.event_type,
                event.entity_type(),
                event.payload.entity_id
            ),
            entity_id: Some(event.payload.entity_id.clone()),
            entity_type: Some(event.entity_type()),
        }
    }

    /// An entry with only a description.
    #[must_use]
    pub fn note(kind: ActivityKind, description: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind,
            event_type: None,
            description: description.into(),
            entity_id: None,
            entity_type: None,
        }
    }
}

/// Ring buffer of [`ActivityEntry`]s; the oldest entry is dropped once the
/// capacity is reached.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(256)),
        }
    }

    pub fn record(&mut self, entry: ActivityEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Entries oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The newest `count` entries, oldest first.
    #[must_use]
    pub fn newest(&self, count: usize) -> Vec<ActivityEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
