//! Dependency edges.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyweave_core::entity::EntityReference;
use uuid::Uuid;

/// How the source of an edge relates to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// The source mentions the target.
    References,
    /// The source contains the target.
    Contains,
    /// The source is owned by the target and cannot exist without it.
    BelongsTo,
    /// Changes to the target alter the source's derived content.
    Affects,
    /// The source cannot exist without the target.
    Requires,
    /// A loose association.
    RelatedTo,
}

impl DependencyType {
    /// Whether deleting the target must delete the source.
    #[must_use]
    pub fn cascades_on_delete(self) -> bool {
        matches!(self, Self::Requires | Self::BelongsTo)
    }

    /// Returns the snake case wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::References => "references",
            Self::Contains => "contains",
            Self::BelongsTo => "belongs_to",
            Self::Affects => "affects",
            Self::Requires => "requires",
            Self::RelatedTo => "related_to",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly an edge binds its endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyStrength {
    /// Informational link.
    Weak,
    /// The default.
    #[default]
    Normal,
    /// A link that should always be surfaced.
    Strong,
}

/// Edge metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyMetadata {
    /// When the edge was added.
    pub created_at: DateTime<Utc>,
    /// Edge strength.
    pub strength: DependencyStrength,
    /// Optional human-readable note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Optional settings for a new edge.
#[derive(Debug, Clone, Default)]
pub struct DependencyOptions {
    /// Edge strength.
    pub strength: DependencyStrength,
    /// Optional human-readable note.
    pub description: Option<String>,
}

/// A directed edge `source -> target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Edge identifier.
    pub id: Uuid,
    /// The dependent entity.
    pub source_entity: EntityReference,
    /// The entity depended upon.
    pub target_entity: EntityReference,
    /// Relationship kind.
    pub dependency_type: DependencyType,
    /// Edge metadata.
    pub metadata: DependencyMetadata,
}
