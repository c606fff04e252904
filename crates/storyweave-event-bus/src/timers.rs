//! Debounce timer queue.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use storyweave_core::event::CoordinationEvent;

use crate::options::AcceptHook;

/// An emission waiting for its debounce window to close.
pub(crate) struct PendingEmission {
    pub(crate) event: CoordinationEvent,
    pub(crate) deadline: DateTime<Utc>,
    pub(crate) hook: Option<AcceptHook>,
}

impl fmt::Debug for PendingEmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEmission")
            .field("event_id", &self.event.id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// One pending emission per debounce key.
#[derive(Debug, Default)]
pub(crate) struct DebounceTimers {
    pending: HashMap<String, PendingEmission>,
}

impl DebounceTimers {
    /// Schedules `pending` under `key`, returning `true` if it replaced an
    /// earlier emission.
    pub(crate) fn schedule(&mut self, key: String, pending: PendingEmission) -> bool {
        self.pending.insert(key, pending).is_some()
    }

    /// Removes and returns every emission due at `now`, earliest first.
    pub(crate) fn take_due(&mut self, now: DateTime<Utc>) -> Vec<PendingEmission> {
        let due_keys: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        let mut due: Vec<PendingEmission> = due_keys
            .iter()
            .filter_map(|key| self.pending.remove(key))
            .collect();
        due.sort_by_key(|pending| (pending.deadline, pending.event.metadata.created_at));
        due
    }

    pub(crate) fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.values().map(|pending| pending.deadline).min()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}
