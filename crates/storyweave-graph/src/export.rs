//! Node/edge export for external graph rendering.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use storyweave_core::entity::{EntityReference, EntityType};
use uuid::Uuid;

use crate::dependency::{Dependency, DependencyStrength, DependencyType};

/// A rendered node, keyed by `"type:id"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node key.
    pub id: String,
    /// Entity type, for styling.
    pub entity_type: EntityType,
    /// Display label: the entity name when known, else its id.
    pub label: String,
}

/// A rendered edge between two node keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Dependency id.
    pub id: Uuid,
    /// Source node key.
    pub source: String,
    /// Target node key.
    pub target: String,
    /// Relationship kind.
    pub dependency_type: DependencyType,
    /// Edge strength.
    pub strength: DependencyStrength,
}

/// Deduplicated nodes and edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphExport {
    /// Unique nodes, in discovery order.
    pub nodes: Vec<GraphNode>,
    /// Unique edges, in discovery order.
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Default)]
pub(crate) struct ExportBuilder {
    export: GraphExport,
    node_keys: HashSet<String>,
    edge_ids: HashSet<Uuid>,
}

impl ExportBuilder {
    pub(crate) fn add_node(&mut self, entity: &EntityReference) {
        let key = entity.key();
        if self.node_keys.insert(key.clone()) {
            self.export.nodes.push(GraphNode {
                id: key,
                entity_type: entity.entity_type,
                label: entity.name.clone().unwrap_or_else(|| entity.id.clone()),
            });
        }
    }

    pub(crate) fn add_edge(&mut self, dependency: &Dependency) {
        self.add_node(&dependency.source_entity);
        self.add_node(&dependency.target_entity);
        if self.edge_ids.insert(dependency.id) {
            self.export.edges.push(GraphEdge {
                id: dependency.id,
                source: dependency.source_entity.key(),
                target: dependency.target_entity.key(),
                dependency_type: dependency.dependency_type,
                strength: dependency.metadata.strength,
            });
        }
    }

    pub(crate) fn finish(self) -> GraphExport {
        self.export
    }
}
