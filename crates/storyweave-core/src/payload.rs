//! Event payloads.
//!
//! A payload names the entity that changed, the project it lives in, and a
//! map of field-level changes. Fields that only exist for one entity type
//! (an act id on a scene, the related beat of a beat) live in
//! [`EntityDetails`], a union tagged by entity type.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityReference, EntityType};

/// Who or what produced an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// A direct user action.
    #[default]
    User,
    /// Internal bookkeeping or a cascading handler.
    System,
    /// An AI assistant acting for the user.
    Agent,
    /// A reverse event produced by undo.
    Undo,
    /// A forward replay produced by redo.
    Redo,
}

/// A single field change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// The previous value, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<serde_json::Value>,
    /// The new value.
    pub new: serde_json::Value,
}

impl FieldChange {
    /// Returns the change that restores `old`, if it was recorded.
    #[must_use]
    pub fn inverted(&self) -> Option<Self> {
        self.old.as_ref().map(|old| Self {
            old: Some(self.new.clone()),
            new: old.clone(),
        })
    }
}

/// Type-specific payload fields, tagged by entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum EntityDetails {
    /// Character details.
    Character {
        /// Faction the character is associated with.
        #[serde(default)]
        faction_id: Option<String>,
    },
    /// Scene details.
    Scene {
        /// Act that contains the scene.
        #[serde(default)]
        act_id: Option<String>,
        /// Characters appearing in the scene.
        #[serde(default)]
        character_ids: Vec<String>,
    },
    /// Act details.
    Act {
        /// Position of the act within the project.
        #[serde(default)]
        order: Option<u32>,
    },
    /// Beat details.
    Beat {
        /// Act that contains the beat.
        #[serde(default)]
        act_id: Option<String>,
        /// Scene the beat plays out in.
        #[serde(default)]
        scene_id: Option<String>,
        /// A beat this one depends on.
        #[serde(default)]
        related_beat_id: Option<String>,
    },
    /// Faction details.
    Faction {
        /// Member added or removed by membership events.
        #[serde(default)]
        member_id: Option<String>,
    },
    /// Asset details.
    Asset {
        /// Free-form asset kind (image, audio, ...).
        #[serde(default)]
        asset_kind: Option<String>,
    },
    /// Relationship details.
    Relationship {
        /// The character the relationship starts from.
        #[serde(default)]
        source_character_id: Option<String>,
        /// The character the relationship points at.
        #[serde(default)]
        target_character_id: Option<String>,
    },
    /// Project details.
    Project {},
}

impl EntityDetails {
    /// Details with every optional field empty.
    #[must_use]
    pub fn empty(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Character => Self::Character { faction_id: None },
            EntityType::Scene => Self::Scene {
                act_id: None,
                character_ids: Vec::new(),
            },
            EntityType::Act => Self::Act { order: None },
            EntityType::Beat => Self::Beat {
                act_id: None,
                scene_id: None,
                related_beat_id: None,
            },
            EntityType::Faction => Self::Faction { member_id: None },
            EntityType::Asset => Self::Asset { asset_kind: None },
            EntityType::Relationship => Self::Relationship {
                source_character_id: None,
                target_character_id: None,
            },
            EntityType::Project => Self::Project {},
        }
    }

    /// The entity type this variant describes.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::Character { .. } => EntityType::Character,
            Self::Scene { .. } => EntityType::Scene,
            Self::Act { .. } => EntityType::Act,
            Self::Beat { .. } => EntityType::Beat,
            Self::Faction { .. } => EntityType::Faction,
            Self::Asset { .. } => EntityType::Asset,
            Self::Relationship { .. } => EntityType::Relationship,
            Self::Project {} => EntityType::Project,
        }
    }
}

/// The minimal payload a caller supplies to `emit`.
///
/// The dispatcher fills the timestamp and source when they are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseEventPayload {
    /// The entity that changed.
    pub entity_id: String,
    /// The project the entity belongs to.
    pub project_id: String,
    /// Explicit event time; defaults to the emission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Explicit source; defaults to [`EventSource::User`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<EventSource>,
    /// Field-level changes.
    #[serde(default)]
    pub changes: BTreeMap<String, FieldChange>,
    /// Type-specific fields.
    pub details: EntityDetails,
}

impl BaseEventPayload {
    /// Creates a payload with no field changes.
    pub fn new(
        entity_id: impl Into<String>,
        project_id: impl Into<String>,
        details: EntityDetails,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            project_id: project_id.into(),
            timestamp: None,
            source: None,
            changes: BTreeMap::new(),
            details,
        }
    }

    /// Creates a payload for `entity` with empty details.
    ///
    /// The project id falls back to an empty string when the reference
    /// carries none.
    #[must_use]
    pub fn for_entity(entity: &EntityReference) -> Self {
        Self::new(
            entity.id.clone(),
            entity.project_id.clone().unwrap_or_default(),
            EntityDetails::empty(entity.entity_type),
        )
    }

    /// Records a field change.
    #[must_use]
    pub fn with_change(
        mut self,
        field: impl Into<String>,
        old: Option<serde_json::Value>,
        new: serde_json::Value,
    ) -> Self {
        self.changes.insert(field.into(), FieldChange { old, new });
        self
    }

    /// Sets the event source.
    #[must_use]
    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets an explicit event time.
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The entity type carried by the details.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.details.entity_type()
    }

    /// Fills defaults and produces the full payload.
    #[must_use]
    pub fn into_payload(self, now: DateTime<Utc>) -> EventPayload {
        EventPayload {
            entity_id: self.entity_id,
            project_id: self.project_id,
            timestamp: self.timestamp.unwrap_or(now),
            source: self.source.unwrap_or_default(),
            changes: self.changes,
            details: self.details,
        }
    }
}

/// The fully populated payload delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// The entity that changed.
    pub entity_id: String,
    /// The project the entity belongs to.
    pub project_id: String,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
    /// Who or what produced the change.
    pub source: EventSource,
    /// Field-level changes.
    pub changes: BTreeMap<String, FieldChange>,
    /// Type-specific fields.
    pub details: EntityDetails,
}

impl EventPayload {
    /// The entity type carried by the details.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.details.entity_type()
    }

    /// A reference to the entity this payload is about.
    #[must_use]
    pub fn entity(&self) -> EntityReference {
        EntityReference::new(self.entity_type(), self.entity_id.clone())
            .with_project(self.project_id.clone())
    }
}

impl From<EventPayload> for BaseEventPayload {
    fn from(payload: EventPayload) -> Self {
        Self {
            entity_id: payload.entity_id,
            project_id: payload.project_id,
            timestamp: Some(payload.timestamp),
            source: Some(payload.source),
            changes: payload.changes,
            details: payload.details,
        }
    }
}
