//! Subscriptions and filter matching.

use std::fmt;
use std::sync::Arc;

use storyweave_core::entity::EntityType;
use storyweave_core::error::CoordinationError;
use storyweave_core::event::{CoordinationEvent, EventType};
use uuid::Uuid;

use crate::bus::EventBus;

/// A subscriber callback. The bus reference lets handlers emit follow-up
/// events, which re-enter the same queue.
pub type EventHandler =
    Arc<dyn Fn(&CoordinationEvent, &EventBus) -> Result<(), CoordinationError> + Send + Sync>;

/// A registered handler and its filters.
#[derive(Clone)]
pub struct Subscription {
    /// Subscription identifier.
    pub id: Uuid,
    /// Event types this subscription receives.
    pub event_types: Vec<EventType>,
    /// Optional entity type filter.
    pub entity_types: Option<Vec<EntityType>>,
    /// Optional project filter.
    pub project_id: Option<String>,
    /// Higher values run first.
    pub priority: i32,
    /// Name used in logs.
    pub label: String,
    pub(crate) handler: EventHandler,
}

impl Subscription {
    /// Whether `event` passes the type, entity type and project filters.
    #[must_use]
    pub fn matches(&self, event: &CoordinationEvent) -> bool {
        if !self.event_types.contains(&event.event_type) {
            return false;
        }
        if let Some(entity_types) = &self.entity_types {
            if !entity_types.contains(&event.entity_type()) {
                return false;
            }
        }
        self.project_id
            .as_ref()
            .is_none_or(|project_id| *project_id == event.payload.project_id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_types", &self.event_types)
            .field("entity_types", &self.entity_types)
            .field("project_id", &self.project_id)
            .field("priority", &self.priority)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
