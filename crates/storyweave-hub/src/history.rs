//! Undo/redo history.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyweave_core::event::{CoordinationEvent, EventType};
use storyweave_core::payload::{BaseEventPayload, EntityDetails, FieldChange};

/// Pre-change state supplied at emit time to reverse one specific event.
///
/// When an event is undone, `changes` replace the original changes field by
/// field and `details`, when present, replace the original details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UndoData {
    /// Field changes that restore the previous values.
    #[serde(default)]
    pub changes: BTreeMap<String, FieldChange>,
    /// Replacement type-specific fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<EntityDetails>,
}

impl UndoData {
    /// Records a field to restore.
    #[must_use]
    pub fn restoring(
        mut self,
        field: impl Into<String>,
        current: serde_json::Value,
        previous: serde_json::Value,
    ) -> Self {
        self.changes.insert(
            field.into(),
            FieldChange {
                old: Some(current),
                new: previous,
            },
        );
        self
    }
}

/// An accepted event and the data needed to reverse it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHistoryEntry {
    /// The event as the bus accepted it.
    pub event: CoordinationEvent,
    /// Caller-supplied reversal data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo_data: Option<UndoData>,
}

impl EventHistoryEntry {
    /// The emission that reverses this entry, if one can be derived.
    ///
    /// Create/delete style pairs map to their counterpart with the same
    /// entity. Update-type events re-emit the same type with the caller's
    /// undo data merged over the original payload or, without undo data,
    /// with every change that recorded an `old` value swapped back.
    #[must_use]
    pub fn reverse(&self) -> Option<(EventType, BaseEventPayload)> {
        let mut payload = BaseEventPayload::from(self.event.payload.clone());
        payload.timestamp = None;
        payload.source = None;

        if let Some(reversed) = self.event.event_type.reverse() {
            if let Some(undo_data) = &self.undo_data {
                merge(&mut payload, undo_data);
            }
            return Some((reversed, payload));
        }

        if !self.event.event_type.is_update() {
            return None;
        }

        match &self.undo_data {
            Some(undo_data) => merge(&mut payload, undo_data),
            None => {
                let inverted: BTreeMap<String, FieldChange> = payload
                    .changes
                    .iter()
                    .filter_map(|(field, change)| change.inverted().map(|c| (field.clone(), c)))
                    .collect();
                if inverted.is_empty() {
                    return None;
                }
                payload.changes = inverted;
            }
        }
        Some((self.event.event_type, payload))
    }
}

fn merge(payload: &mut BaseEventPayload, undo_data: &UndoData) {
    for (field, change) in &undo_data.changes {
        payload.changes.insert(field.clone(), change.clone());
    }
    if let Some(details) = &undo_data.details {
        payload.details = details.clone();
    }
}

/// Snapshot of the undo/redo state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoContext {
    /// Whether `undo` would do anything.
    pub can_undo: bool,
    /// Whether `redo` would do anything.
    pub can_redo: bool,
    /// Oldest first.
    pub undo_stack: Vec<EventHistoryEntry>,
    /// Oldest first.
    pub redo_stack: Vec<EventHistoryEntry>,
    /// When `undo` last ran.
    pub last_undo_timestamp: Option<DateTime<Utc>>,
}

/// Bounded undo and redo stacks. Pushing past the bound drops the oldest
/// entry of that stack.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    max_entries: usize,
    undo_stack: VecDeque<EventHistoryEntry>,
    redo_stack: VecDeque<EventHistoryEntry>,
    last_undo_timestamp: Option<DateTime<Utc>>,
}

impl UndoHistory {
    /// Creates empty stacks bounded by `max_entries`.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            last_undo_timestamp: None,
        }
    }

    pub fn push_undo(&mut self, entry: EventHistoryEntry) {
        push_bounded(&mut self.undo_stack, entry, self.max_entries);
    }

    pub fn push_redo(&mut self, entry: EventHistoryEntry) {
        push_bounded(&mut self.redo_stack, entry, self.max_entries);
    }

    pub fn pop_undo(&mut self) -> Option<EventHistoryEntry> {
        self.undo_stack.pop_back()
    }

    pub fn pop_redo(&mut self) -> Option<EventHistoryEntry> {
        self.redo_stack.pop_back()
    }

    pub fn clear_redo(&mut self) {
        self.redo_stack.clear();
    }

    pub fn mark_undone(&mut self, at: DateTime<Utc>) {
        self.last_undo_timestamp = Some(at);
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Copies both stacks, oldest first.
    #[must_use]
    pub fn context(&self) -> UndoContext {
        UndoContext {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            undo_stack: self.undo_stack.iter().cloned().collect(),
            redo_stack: self.redo_stack.iter().cloned().collect(),
            last_undo_timestamp: self.last_undo_timestamp,
        }
    }

    /// Replaces the stacks with a restored context, keeping at most
    /// `max_entries` of the newest entries of each.
    pub fn restore(&mut self, context: UndoContext) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        for entry in context.undo_stack {
            self.push_undo(entry);
        }
        for entry in context.redo_stack {
            self.push_redo(entry);
        }
        self.last_undo_timestamp = context.last_undo_timestamp;
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_undo_timestamp = None;
    }
}

fn push_bounded(stack: &mut VecDeque<EventHistoryEntry>, entry: EventHistoryEntry, max: usize) {
    stack.push_back(entry);
    while stack.len() > max {
        stack.pop_front();
    }
}
