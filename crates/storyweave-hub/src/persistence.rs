//! Serialized hub state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storyweave_core::error::CoordinationError;
use storyweave_graph::Dependency;

use crate::activity::ActivityEntry;
use crate::history::UndoContext;

/// What `save_state` writes under the persistence key.
///
/// Stacks and the activity log are trimmed to their newest entries before
/// saving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub undo_context: UndoContext,
    pub dependencies: Vec<Dependency>,
    pub activity_log: Vec<ActivityEntry>,
    pub saved_at: DateTime<Utc>,
}

impl PersistedState {
    pub(crate) fn trimmed(
        mut undo_context: UndoContext,
        dependencies: Vec<Dependency>,
        activity_log: Vec<ActivityEntry>,
        history_size: usize,
        saved_at: DateTime<Utc>,
    ) -> Self {
        keep_newest(&mut undo_context.undo_stack, history_size);
        keep_newest(&mut undo_context.redo_stack, history_size);
        Self {
            undo_context,
            dependencies,
            activity_log,
            saved_at,
        }
    }

    pub(crate) fn to_value(&self) -> Result<Value, CoordinationError> {
        Ok(serde_json::to_value(self)?)
    }

    pub(crate) fn from_value(value: Value) -> Result<Self, CoordinationError> {
        Ok(serde_json::from_value(value)?)
    }
}

fn keep_newest<T>(entries: &mut Vec<T>, count: usize) {
    let excess = entries.len().saturating_sub(count);
    entries.drain(..excess);
}
