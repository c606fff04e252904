//! Staged changes awaiting confirmation.

use chrono::{DateTime, Utc};
use storyweave_core::entity::EntityReference;
use storyweave_core::event::EventType;
use storyweave_core::payload::BaseEventPayload;
use storyweave_graph::ImpactAnalysis;
use uuid::Uuid;

use crate::hub::HubEmitOptions;

/// A mutation whose impact was computed at stage time and whose event is
/// only emitted on execute.
#[derive(Debug, Clone)]
pub struct PendingChange {
    pub id: Uuid,
    pub entity: EntityReference,
    pub event_type: EventType,
    pub payload: BaseEventPayload,
    pub options: HubEmitOptions,
    pub impact: ImpactAnalysis,
    pub created_at: DateTime<Utc>,
}

/// Pending changes in staging order.
#[derive(Debug, Default)]
pub(crate) struct StagingArea {
    changes: Vec<PendingChange>,
}

impl StagingArea {
    pub(crate) fn stage(&mut self, change: PendingChange) {
        self.changes.push(change);
    }

    pub(crate) fn take(&mut self, change_id: Uuid) -> Option<PendingChange> {
        let index = self.changes.iter().position(|c| c.id == change_id)?;
        Some(self.changes.remove(index))
    }

    pub(crate) fn take_all(&mut self) -> Vec<PendingChange> {
        std::mem::take(&mut self.changes)
    }

    pub(crate) fn snapshot(&self) -> Vec<PendingChange> {
        self.changes.clone()
    }

    pub(crate) fn clear(&mut self) {
        self.changes.clear();
    }
}
