//! Impact analysis results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyweave_core::entity::EntityReference;
use storyweave_core::event::EventType;

use crate::dependency::DependencyType;

/// What a caller should do with an affected entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Apply the change to the dependent.
    Update,
    /// Ask someone to look at the dependent.
    Review,
    /// Rebuild derived content.
    Regenerate,
    /// Tell the owner; nothing needs to change.
    Notify,
}

impl SuggestedAction {
    /// The action implied by an edge of type `dependency_type`.
    #[must_use]
    pub fn for_dependency(dependency_type: DependencyType) -> Self {
        match dependency_type {
            DependencyType::Requires | DependencyType::Contains | DependencyType::BelongsTo => {
                Self::Update
            }
            DependencyType::Affects => Self::Regenerate,
            DependencyType::References => Self::Review,
            DependencyType::RelatedTo => Self::Notify,
        }
    }
}

/// Whether an entity is affected through one edge or through a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactLevel {
    /// One edge away from the changed entity.
    Direct,
    /// Further away, or derived from a static rule.
    Indirect,
}

/// One affected entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactNode {
    /// The affected entity; id `*` for rule-derived nodes.
    pub entity: EntityReference,
    /// Distance class.
    pub impact_level: ImpactLevel,
    /// Entity ids walked from the changed entity to this one.
    pub dependency_path: Vec<String>,
    /// Suggested follow-up.
    pub suggested_action: SuggestedAction,
}

/// Everything affected by a change to `source_entity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    /// The changed entity.
    pub source_entity: EntityReference,
    /// The change being analysed.
    pub event_type: EventType,
    /// Affected entities, graph-derived first, then rule-derived.
    pub affected_entities: Vec<ImpactNode>,
    /// `affected_entities.len()`.
    pub total_affected: usize,
    /// When the analysis ran.
    pub analysis_timestamp: DateTime<Utc>,
}

impl ImpactAnalysis {
    /// Graph-derived nodes one edge away.
    pub fn direct(&self) -> impl Iterator<Item = &ImpactNode> {
        self.affected_entities
            .iter()
            .filter(|node| node.impact_level == ImpactLevel::Direct)
    }

    /// Whether `entity` appears among the affected entities.
    #[must_use]
    pub fn affects(&self, entity: &EntityReference) -> bool {
        self.affected_entities.iter().any(|node| node.entity == *entity)
    }
}
