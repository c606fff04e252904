//! Static relationship tables.

use storyweave_core::entity::EntityType;

use crate::dependency::DependencyType;
use crate::impact::SuggestedAction;

use DependencyType::{BelongsTo, Contains, References, RelatedTo, Requires};
use EntityType::{Act, Asset, Beat, Character, Faction, Project, Relationship, Scene};
use SuggestedAction::{Notify, Regenerate, Review, Update};

/// A change to an entity of some type is known to affect `target` entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactRule {
    /// Affected entity type.
    pub target: EntityType,
    /// What to do about it.
    pub action: SuggestedAction,
}

/// An entity of some type is expected to have a `dependency_type` edge to
/// entities of type `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDependencyRule {
    /// Related entity type.
    pub target: EntityType,
    /// Edge type used from the entity to the related one.
    pub dependency_type: DependencyType,
}

const fn impact(target: EntityType, action: SuggestedAction) -> ImpactRule {
    ImpactRule { target, action }
}

const fn edge(target: EntityType, dependency_type: DependencyType) -> EntityDependencyRule {
    EntityDependencyRule {
        target,
        dependency_type,
    }
}

const CHARACTER_IMPACT: &[ImpactRule] = &[
    impact(Scene, Review),
    impact(Relationship, Update),
    impact(Faction, Notify),
    impact(Beat, Review),
];
const SCENE_IMPACT: &[ImpactRule] = &[
    impact(Beat, Review),
    impact(Act, Update),
    impact(Asset, Regenerate),
];
const ACT_IMPACT: &[ImpactRule] = &[impact(Scene, Review), impact(Beat, Review)];
const BEAT_IMPACT: &[ImpactRule] = &[impact(Scene, Update)];
const FACTION_IMPACT: &[ImpactRule] = &[impact(Character, Notify), impact(Relationship, Review)];
const ASSET_IMPACT: &[ImpactRule] = &[impact(Scene, Notify), impact(Character, Notify)];
const RELATIONSHIP_IMPACT: &[ImpactRule] = &[impact(Character, Notify)];
const PROJECT_IMPACT: &[ImpactRule] = &[
    impact(Act, Notify),
    impact(Scene, Notify),
    impact(Character, Notify),
];

const SCENE_EDGES: &[EntityDependencyRule] = &[
    edge(Project, BelongsTo),
    edge(Act, BelongsTo),
    edge(Character, References),
    edge(Asset, References),
];
const BEAT_EDGES: &[EntityDependencyRule] = &[
    edge(Project, BelongsTo),
    edge(Act, BelongsTo),
    edge(Scene, References),
    edge(Beat, Requires),
    edge(Character, References),
];
const ACT_EDGES: &[EntityDependencyRule] = &[edge(Project, BelongsTo)];
const CHARACTER_EDGES: &[EntityDependencyRule] = &[
    edge(Project, BelongsTo),
    edge(Faction, RelatedTo),
    edge(Asset, References),
];
const FACTION_EDGES: &[EntityDependencyRule] = &[edge(Project, BelongsTo), edge(Character, Contains)];
const RELATIONSHIP_EDGES: &[EntityDependencyRule] =
    &[edge(Project, BelongsTo), edge(Character, Requires)];
const ASSET_EDGES: &[EntityDependencyRule] = &[edge(Project, BelongsTo)];

/// Entity types affected by a change to an entity of `entity_type`,
/// regardless of recorded edges.
#[must_use]
pub fn impact_propagation(entity_type: EntityType) -> &'static [ImpactRule] {
    match entity_type {
        Character => CHARACTER_IMPACT,
        Scene => SCENE_IMPACT,
        Act => ACT_IMPACT,
        Beat => BEAT_IMPACT,
        Faction => FACTION_IMPACT,
        Asset => ASSET_IMPACT,
        Relationship => RELATIONSHIP_IMPACT,
        Project => PROJECT_IMPACT,
    }
}

/// Edges an entity of `entity_type` is expected to have.
#[must_use]
pub fn entity_dependency_rules(entity_type: EntityType) -> &'static [EntityDependencyRule] {
    match entity_type {
        Scene => SCENE_EDGES,
        Beat => BEAT_EDGES,
        Act => ACT_EDGES,
        Character => CHARACTER_EDGES,
        Faction => FACTION_EDGES,
        Relationship => RELATIONSHIP_EDGES,
        Asset => ASSET_EDGES,
        Project => &[],
    }
}

/// The edge type an entity of `source` uses towards an entity of `target`,
/// if the rule table defines one.
#[must_use]
pub fn dependency_type_between(source: EntityType, target: EntityType) -> Option<DependencyType> {
    entity_dependency_rules(source)
        .iter()
        .find(|rule| rule.target == target)
        .map(|rule| rule.dependency_type)
}
