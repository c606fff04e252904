//! Entity references.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// The closed set of domain entity kinds the coordination layer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A story character.
    Character,
    /// A scene within an act.
    Scene,
    /// An act grouping scenes.
    Act,
    /// A story beat.
    Beat,
    /// A faction characters can belong to.
    Faction,
    /// A media or reference asset.
    Asset,
    /// A relationship between two characters.
    Relationship,
    /// The project that owns all other entities.
    Project,
}

impl EntityType {
    /// All entity types, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Character,
        Self::Scene,
        Self::Act,
        Self::Beat,
        Self::Faction,
        Self::Asset,
        Self::Relationship,
        Self::Project,
    ];

    /// Returns the lowercase wire name of this entity type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Scene => "scene",
            Self::Act => "act",
            Self::Beat => "beat",
            Self::Faction => "faction",
            Self::Asset => "asset",
            Self::Relationship => "relationship",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed pointer to a domain entity.
///
/// Equality and hashing consider only `entity_type` and `id`; `name` and
/// `project_id` are display metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReference {
    /// The kind of entity.
    pub entity_type: EntityType,
    /// The entity identifier.
    pub id: String,
    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional owning project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl EntityReference {
    /// Creates a reference with no display metadata.
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
            name: None,
            project_id: None,
        }
    }

    /// Attaches a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches the owning project.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Returns the index key `"type:id"`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.entity_type, self.id)
    }
}

impl PartialEq for EntityReference {
    fn eq(&self, other: &Self) -> bool {
        self.entity_type == other.entity_type && self.id == other.id
    }
}

impl Eq for EntityReference {}

impl Hash for EntityReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_type.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}:{} ({name})", self.entity_type, self.id),
            None => write!(f, "{}:{}", self.entity_type, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_references_compare_by_type_and_id_only() {
        // Arrange
        let a = EntityReference::new(EntityType::Scene, "s1").with_name("Opening");
        let b = EntityReference::new(EntityType::Scene, "s1").with_project("p9");
        let c = EntityReference::new(EntityType::Beat, "s1");

        // Assert
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_key_joins_type_and_id() {
        let reference = EntityReference::new(EntityType::Character, "c-42");

        assert_eq!(reference.key(), "character:c-42");
    }

    #[test]
    fn test_entity_type_serializes_as_snake_case() {
        let json = serde_json::to_string(&EntityType::Relationship).unwrap();

        assert_eq!(json, "\"relationship\"");
    }
}
