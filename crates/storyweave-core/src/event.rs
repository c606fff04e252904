//! Coordination events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityType;
use crate::payload::EventPayload;

/// Every event the coordination layer can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A character was created.
    CharacterCreated,
    /// Character fields changed.
    CharacterUpdated,
    /// A character was deleted.
    CharacterDeleted,
    /// A character's visual description changed.
    CharacterAppearanceChanged,
    /// A scene was created.
    SceneCreated,
    /// Scene fields changed.
    SceneUpdated,
    /// A scene was deleted.
    SceneDeleted,
    /// A scene moved within its act.
    SceneReordered,
    /// An act was created.
    ActCreated,
    /// Act fields changed.
    ActUpdated,
    /// An act was deleted.
    ActDeleted,
    /// A beat was created.
    BeatCreated,
    /// Beat fields changed.
    BeatUpdated,
    /// A beat was deleted.
    BeatDeleted,
    /// A faction was created.
    FactionCreated,
    /// Faction fields changed.
    FactionUpdated,
    /// A faction was deleted.
    FactionDeleted,
    /// A character joined a faction.
    FactionMemberAdded,
    /// A character left a faction.
    FactionMemberRemoved,
    /// An asset was created.
    AssetCreated,
    /// Asset fields changed.
    AssetUpdated,
    /// An asset was deleted.
    AssetDeleted,
    /// A relationship was created.
    RelationshipCreated,
    /// Relationship fields changed.
    RelationshipUpdated,
    /// A relationship was deleted.
    RelationshipDeleted,
    /// A project was created.
    ProjectCreated,
    /// Project fields changed.
    ProjectUpdated,
    /// A project was deleted.
    ProjectDeleted,
}

impl EventType {
    /// All event types, in declaration order.
    pub const ALL: [Self; 28] = [
        Self::CharacterCreated,
        Self::CharacterUpdated,
        Self::CharacterDeleted,
        Self::CharacterAppearanceChanged,
        Self::SceneCreated,
        Self::SceneUpdated,
        Self::SceneDeleted,
        Self::SceneReordered,
        Self::ActCreated,
        Self::ActUpdated,
        Self::ActDeleted,
        Self::BeatCreated,
        Self::BeatUpdated,
        Self::BeatDeleted,
        Self::FactionCreated,
        Self::FactionUpdated,
        Self::FactionDeleted,
        Self::FactionMemberAdded,
        Self::FactionMemberRemoved,
        Self::AssetCreated,
        Self::AssetUpdated,
        Self::AssetDeleted,
        Self::RelationshipCreated,
        Self::RelationshipUpdated,
        Self::RelationshipDeleted,
        Self::ProjectCreated,
        Self::ProjectUpdated,
        Self::ProjectDeleted,
    ];

    /// Returns the wire name, e.g. `CHARACTER_CREATED`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CharacterCreated => "CHARACTER_CREATED",
            Self::CharacterUpdated => "CHARACTER_UPDATED",
            Self::CharacterDeleted => "CHARACTER_DELETED",
            Self::CharacterAppearanceChanged => "CHARACTER_APPEARANCE_CHANGED",
            Self::SceneCreated => "SCENE_CREATED",
            Self::SceneUpdated => "SCENE_UPDATED",
            Self::SceneDeleted => "SCENE_DELETED",
            Self::SceneReordered => "SCENE_REORDERED",
            Self::ActCreated => "ACT_CREATED",
            Self::ActUpdated => "ACT_UPDATED",
            Self::ActDeleted => "ACT_DELETED",
            Self::BeatCreated => "BEAT_CREATED",
            Self::BeatUpdated => "BEAT_UPDATED",
            Self::BeatDeleted => "BEAT_DELETED",
            Self::FactionCreated => "FACTION_CREATED",
            Self::FactionUpdated => "FACTION_UPDATED",
            Self::FactionDeleted => "FACTION_DELETED",
            Self::FactionMemberAdded => "FACTION_MEMBER_ADDED",
            Self::FactionMemberRemoved => "FACTION_MEMBER_REMOVED",
            Self::AssetCreated => "ASSET_CREATED",
            Self::AssetUpdated => "ASSET_UPDATED",
            Self::AssetDeleted => "ASSET_DELETED",
            Self::RelationshipCreated => "RELATIONSHIP_CREATED",
            Self::RelationshipUpdated => "RELATIONSHIP_UPDATED",
            Self::RelationshipDeleted => "RELATIONSHIP_DELETED",
            Self::ProjectCreated => "PROJECT_CREATED",
            Self::ProjectUpdated => "PROJECT_UPDATED",
            Self::ProjectDeleted => "PROJECT_DELETED",
        }
    }

    /// The entity type this event is about.
    #[must_use]
    pub fn entity_type(self) -> EntityType {
        match self {
            Self::CharacterCreated
            | Self::CharacterUpdated
            | Self::CharacterDeleted
            | Self::CharacterAppearanceChanged => EntityType::Character,
            Self::SceneCreated | Self::SceneUpdated | Self::SceneDeleted | Self::SceneReordered => {
                EntityType::Scene
            }
            Self::ActCreated | Self::ActUpdated | Self::ActDeleted => EntityType::Act,
            Self::BeatCreated | Self::BeatUpdated | Self::BeatDeleted => EntityType::Beat,
            Self::FactionCreated
            | Self::FactionUpdated
            | Self::FactionDeleted
            | Self::FactionMemberAdded
            | Self::FactionMemberRemoved => EntityType::Faction,
            Self::AssetCreated | Self::AssetUpdated | Self::AssetDeleted => EntityType::Asset,
            Self::RelationshipCreated | Self::RelationshipUpdated | Self::RelationshipDeleted => {
                EntityType::Relationship
            }
            Self::ProjectCreated | Self::ProjectUpdated | Self::ProjectDeleted => {
                EntityType::Project
            }
        }
    }

    /// The event that reverses this one, for create/delete style pairs.
    #[must_use]
    pub fn reverse(self) -> Option<Self> {
        let reversed = match self {
            Self::CharacterCreated => Self::CharacterDeleted,
            Self::CharacterDeleted => Self::CharacterCreated,
            Self::SceneCreated => Self::SceneDeleted,
            Self::SceneDeleted => Self::SceneCreated,
            Self::ActCreated => Self::ActDeleted,
            Self::ActDeleted => Self::ActCreated,
            Self::BeatCreated => Self::BeatDeleted,
            Self::BeatDeleted => Self::BeatCreated,
            Self::FactionCreated => Self::FactionDeleted,
            Self::FactionDeleted => Self::FactionCreated,
            Self::FactionMemberAdded => Self::FactionMemberRemoved,
            Self::FactionMemberRemoved => Self::FactionMemberAdded,
            Self::AssetCreated => Self::AssetDeleted,
            Self::AssetDeleted => Self::AssetCreated,
            Self::RelationshipCreated => Self::RelationshipDeleted,
            Self::RelationshipDeleted => Self::RelationshipCreated,
            Self::ProjectCreated => Self::ProjectDeleted,
            Self::ProjectDeleted => Self::ProjectCreated,
            Self::CharacterUpdated
            | Self::CharacterAppearanceChanged
            | Self::SceneUpdated
            | Self::SceneReordered
            | Self::ActUpdated
            | Self::BeatUpdated
            | Self::FactionUpdated
            | Self::AssetUpdated
            | Self::RelationshipUpdated
            | Self::ProjectUpdated => return None,
        };
        Some(reversed)
    }

    /// Whether this event mutates fields of an existing entity in place.
    #[must_use]
    pub fn is_update(self) -> bool {
        matches!(
            self,
            Self::CharacterUpdated
                | Self::CharacterAppearanceChanged
                | Self::SceneUpdated
                | Self::SceneReordered
                | Self::ActUpdated
                | Self::BeatUpdated
                | Self::FactionUpdated
                | Self::AssetUpdated
                | Self::RelationshipUpdated
                | Self::ProjectUpdated
        )
    }

    /// Whether this event removes an entity.
    #[must_use]
    pub fn is_delete(self) -> bool {
        matches!(
            self,
            Self::CharacterDeleted
                | Self::SceneDeleted
                | Self::ActDeleted
                | Self::BeatDeleted
                | Self::FactionDeleted
                | Self::AssetDeleted
                | Self::RelationshipDeleted
                | Self::ProjectDeleted
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatch priority tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Dispatched after everything else.
    Low,
    /// The default tier.
    #[default]
    Normal,
    /// Dispatched ahead of normal and low events.
    High,
}

impl Priority {
    /// Sort rank: lower ranks are dispatched first.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// Dispatcher bookkeeping attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// When the event was constructed.
    pub created_at: DateTime<Utc>,
    /// When the dispatcher dequeued the event.
    pub processed_at: Option<DateTime<Utc>>,
    /// Set once every matching handler has run.
    pub acknowledged: bool,
    /// Delivery attempts beyond the first.
    pub retry_count: u32,
    /// Dispatch priority tier.
    pub priority: Priority,
    /// Batch this event was emitted in, if any.
    pub batch_id: Option<Uuid>,
    /// Handler hops between this event and the emission that started its
    /// chain. Zero for events emitted outside any handler.
    #[serde(default)]
    pub cascade_depth: usize,
}

/// The event envelope delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// What happened.
    pub event_type: EventType,
    /// The entity and field changes involved.
    pub payload: EventPayload,
    /// Dispatcher bookkeeping.
    pub metadata: EventMetadata,
}

impl CoordinationEvent {
    /// The entity type carried by the payload.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.payload.entity_type()
    }
}
