//! The dependency graph.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use storyweave_core::clock::Clock;
use storyweave_core::config::CoordinationConfig;
use storyweave_core::entity::EntityReference;
use storyweave_core::event::EventType;
use tracing::debug;
use uuid::Uuid;

use crate::dependency::{Dependency, DependencyMetadata, DependencyOptions, DependencyType};
use crate::export::{ExportBuilder, GraphExport};
use crate::impact::{ImpactAnalysis, ImpactLevel, ImpactNode, SuggestedAction};
use crate::rules::{dependency_type_between, impact_propagation};

/// Entity id used for nodes produced by static impact rules.
pub const WILDCARD_ENTITY_ID: &str = "*";

/// Directed, typed edges between entities, indexed by source and by target.
pub struct DependencyGraph {
    clock: Arc<dyn Clock>,
    max_traversal_depth: usize,
    dependencies: HashMap<Uuid, Dependency>,
    insertion_order: Vec<Uuid>,
    forward: HashMap<String, Vec<Uuid>>,
    reverse: HashMap<String, Vec<Uuid>>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("max_traversal_depth", &self.max_traversal_depth)
            .field("dependencies", &self.dependencies.len())
            .finish_non_exhaustive()
    }
}

impl DependencyGraph {
    /// Creates an empty graph with the default traversal bound.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            max_traversal_depth: CoordinationConfig::default().max_traversal_depth,
            dependencies: HashMap::new(),
            insertion_order: Vec::new(),
            forward: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Overrides the depth bound used by impact traversal.
    #[must_use]
    pub fn with_max_traversal_depth(mut self, depth: usize) -> Self {
        self.max_traversal_depth = depth;
        self
    }

    /// Adds `source -> target` and returns its id. Adding an edge identical
    /// in source, target and type returns the existing id.
    pub fn add_dependency(
        &mut self,
        source: EntityReference,
        target: EntityReference,
        dependency_type: DependencyType,
        options: DependencyOptions,
    ) -> Uuid {
        if let Some(existing) = self.find_dependency(&source, &target, dependency_type) {
            return existing;
        }

        let id = Uuid::new_v4();
        let source_key = source.key();
        let target_key = target.key();
        debug!(dependency_id = %id, source = %source_key, target = %target_key, dependency_type = %dependency_type, "adding dependency");

        self.dependencies.insert(
            id,
            Dependency {
                id,
                source_entity: source,
                target_entity: target,
                dependency_type,
                metadata: DependencyMetadata {
                    created_at: self.clock.now(),
                    strength: options.strength,
                    description: options.description,
                },
            },
        );
        self.insertion_order.push(id);
        self.forward.entry(source_key).or_default().push(id);
        self.reverse.entry(target_key).or_default().push(id);
        id
    }

    /// Returns the id of an existing edge matching all three parts.
    #[must_use]
    pub fn find_dependency(
        &self,
        source: &EntityReference,
        target: &EntityReference,
        dependency_type: DependencyType,
    ) -> Option<Uuid> {
        self.get_dependencies(source)
            .into_iter()
            .find(|d| d.target_entity == *target && d.dependency_type == dependency_type)
            .map(|d| d.id)
    }

    /// Removes one edge. Returns `false` if the id is unknown.
    pub fn remove_dependency(&mut self, dependency_id: Uuid) -> bool {
        let Some(dependency) = self.dependencies.remove(&dependency_id) else {
            return false;
        };
        unindex(&mut self.forward, &dependency.source_entity.key(), dependency_id);
        unindex(&mut self.reverse, &dependency.target_entity.key(), dependency_id);
        self.insertion_order.retain(|id| *id != dependency_id);
        true
    }

    /// Removes every edge where `entity` is the source or the target.
    /// Returns the number of edges removed.
    pub fn remove_entity_dependencies(&mut self, entity: &EntityReference) -> usize {
        let key = entity.key();
        let mut touching: Vec<Uuid> = self.forward.get(&key).cloned().unwrap_or_default();
        for id in self.reverse.get(&key).into_iter().flatten() {
            if !touching.contains(id) {
                touching.push(*id);
            }
        }
        touching
            .into_iter()
            .filter(|id| self.remove_dependency(*id))
            .count()
    }

    /// Outgoing edges: what `entity` depends on.
    #[must_use]
    pub fn get_dependencies(&self, entity: &EntityReference) -> Vec<&Dependency> {
        self.lookup(&self.forward, entity)
    }

    /// Incoming edges: what depends on `entity`.
    #[must_use]
    pub fn get_dependents(&self, entity: &EntityReference) -> Vec<&Dependency> {
        self.lookup(&self.reverse, entity)
    }

    fn lookup(&self, index: &HashMap<String, Vec<Uuid>>, entity: &EntityReference) -> Vec<&Dependency> {
        index
            .get(&entity.key())
            .into_iter()
            .flatten()
            .filter_map(|id| self.dependencies.get(id))
            .collect()
    }

    /// Computes what a change to `entity` affects.
    ///
    /// Graph-derived dependents come first: one edge away they are
    /// `Direct`, further out `Indirect`. Static rules for the entity type then
    /// add a wildcard `Indirect` node for each target type that no direct
    /// dependent already covers.
    #[must_use]
    pub fn analyze_impact(&self, entity: &EntityReference, event_type: EventType) -> ImpactAnalysis {
        let mut visited = HashSet::from([entity.key()]);
        let mut affected = Vec::new();
        self.traverse_dependents(entity, 0, &[entity.id.clone()], &mut visited, &mut affected);

        for rule in impact_propagation(entity.entity_type) {
            let covered = affected.iter().any(|node| {
                node.impact_level == ImpactLevel::Direct && node.entity.entity_type == rule.target
            });
            if covered {
                continue;
            }
            let mut wildcard = EntityReference::new(rule.target, WILDCARD_ENTITY_ID);
            wildcard.project_id.clone_from(&entity.project_id);
            affected.push(ImpactNode {
                entity: wildcard,
                impact_level: ImpactLevel::Indirect,
                dependency_path: vec![entity.id.clone()],
                suggested_action: rule.action,
            });
        }

        debug!(entity = %entity.key(), event_type = %event_type, affected = affected.len(), "impact analysed");
        ImpactAnalysis {
            source_entity: entity.clone(),
            event_type,
            total_affected: affected.len(),
            affected_entities: affected,
            analysis_timestamp: self.clock.now(),
        }
    }

    /// Depth-first walk over dependents. Every unvisited dependent of a node
    /// is recorded before descending, so an entity one edge away from the
    /// root is always `Direct` even when a longer path reaches it first.
    fn traverse_dependents(
        &self,
        entity: &EntityReference,
        depth: usize,
        path: &[String],
        visited: &mut HashSet<String>,
        affected: &mut Vec<ImpactNode>,
    ) {
        if depth >= self.max_traversal_depth {
            return;
        }

        let mut descend = Vec::new();
        for dependency in self.get_dependents(entity) {
            let dependent = &dependency.source_entity;
            if !visited.insert(dependent.key()) {
                continue;
            }
            let mut dependency_path = path.to_vec();
            dependency_path.push(dependent.id.clone());
            affected.push(ImpactNode {
                entity: dependent.clone(),
                impact_level: if depth == 0 {
                    ImpactLevel::Direct
                } else {
                    ImpactLevel::Indirect
                },
                dependency_path: dependency_path.clone(),
                suggested_action: SuggestedAction::for_dependency(dependency.dependency_type),
            });
            descend.push((dependent, dependency_path));
        }

        for (dependent, dependency_path) in descend {
            self.traverse_dependents(dependent, depth + 1, &dependency_path, visited, affected);
        }
    }

    /// Entities that cannot exist without `entity`: dependents reached only
    /// through `requires` and `belongs_to` edges, recursively. The entity
    /// itself is not included.
    #[must_use]
    pub fn get_delete_impact(&self, entity: &EntityReference) -> Vec<EntityReference> {
        let mut visited = HashSet::from([entity.key()]);
        let mut doomed = Vec::new();
        self.collect_cascade(entity, &mut visited, &mut doomed);
        doomed
    }

    fn collect_cascade(
        &self,
        entity: &EntityReference,
        visited: &mut HashSet<String>,
        doomed: &mut Vec<EntityReference>,
    ) {
        for dependency in self.get_dependents(entity) {
            if !dependency.dependency_type.cascades_on_delete() {
                continue;
            }
            let dependent = &dependency.source_entity;
            if visited.insert(dependent.key()) {
                doomed.push(dependent.clone());
                self.collect_cascade(dependent, visited, doomed);
            }
        }
    }

    /// Adds `entity -> related` edges for every related reference whose type
    /// has a rule for `entity`'s type. Returns the ids of the edges added or
    /// already present.
    pub fn register_entity_dependencies(
        &mut self,
        entity: &EntityReference,
        related: &[EntityReference],
    ) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(related.len());
        for target in related {
            match dependency_type_between(entity.entity_type, target.entity_type) {
                Some(dependency_type) => ids.push(self.add_dependency(
                    entity.clone(),
                    target.clone(),
                    dependency_type,
                    DependencyOptions::default(),
                )),
                None => debug!(
                    entity = %entity.key(),
                    related = %target.key(),
                    "no dependency rule for related entity; skipped"
                ),
            }
        }
        ids
    }

    /// Every node and edge in the graph.
    #[must_use]
    pub fn export_for_visualization(&self) -> GraphExport {
        let mut builder = ExportBuilder::default();
        for dependency in self.dependencies() {
            builder.add_edge(dependency);
        }
        builder.finish()
    }

    /// Nodes and edges within `max_depth` hops of `entity`, following edges
    /// in both directions.
    #[must_use]
    pub fn get_subgraph(&self, entity: &EntityReference, max_depth: usize) -> GraphExport {
        let mut builder = ExportBuilder::default();
        builder.add_node(entity);

        let mut visited = HashSet::from([entity.key()]);
        let mut frontier = VecDeque::from([(entity.clone(), 0_usize)]);
        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let edges = self
                .get_dependencies(&current)
                .into_iter()
                .chain(self.get_dependents(&current));
            for dependency in edges {
                builder.add_edge(dependency);
                let neighbor = if dependency.source_entity == current {
                    &dependency.target_entity
                } else {
                    &dependency.source_entity
                };
                if visited.insert(neighbor.key()) {
                    frontier.push_back((neighbor.clone(), depth + 1));
                }
            }
        }
        builder.finish()
    }

    /// Number of edges.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// All edges, in insertion order.
    #[must_use]
    pub fn dependencies(&self) -> Vec<&Dependency> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.dependencies.get(id))
            .collect()
    }

    /// Replaces the graph contents with `dependencies`, rebuilding both
    /// indices.
    pub fn restore(&mut self, dependencies: Vec<Dependency>) {
        self.clear();
        for dependency in dependencies {
            let id = dependency.id;
            self.forward
                .entry(dependency.source_entity.key())
                .or_default()
                .push(id);
            self.reverse
                .entry(dependency.target_entity.key())
                .or_default()
                .push(id);
            self.insertion_order.push(id);
            self.dependencies.insert(id, dependency);
        }
    }

    /// Removes every edge.
    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.insertion_order.clear();
        self.forward.clear();
        self.reverse.clear();
    }
}

fn unindex(index: &mut HashMap<String, Vec<Uuid>>, key: &str, dependency_id: Uuid) {
    if let Some(ids) = index.get_mut(key) {
        ids.retain(|id| *id != dependency_id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use storyweave_core::entity::EntityType;
    use storyweave_test_support::{FixedClock, fixed_now};

    use super::*;

    fn graph() -> DependencyGraph {
        DependencyGraph::new(Arc::new(FixedClock(fixed_now())))
    }

    fn entity(entity_type: EntityType, id: &str) -> EntityReference {
        EntityReference::new(entity_type, id)
    }

    #[test]
    fn test_add_dependency_indexes_both_directions() {
        // Arrange
        let mut graph = graph();
        let scene = entity(EntityType::Scene, "s1");
        let character = entity(EntityType::Character, "c1");

        // Act
        let id = graph.add_dependency(
            scene.clone(),
            character.clone(),
            DependencyType::References,
            DependencyOptions::default(),
        );

        // Assert
        let outgoing = graph.get_dependencies(&scene);
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].id, id);
        assert_eq!(outgoing[0].metadata.created_at, fixed_now());
        assert_eq!(graph.get_dependents(&character)[0].id, id);
        assert!(graph.get_dependents(&scene).is_empty());
    }

    #[test]
    fn test_identical_edge_is_stored_once() {
        let mut graph = graph();
        let scene = entity(EntityType::Scene, "s1");
        let act = entity(EntityType::Act, "a1");

        let first = graph.add_dependency(scene.clone(), act.clone(), DependencyType::BelongsTo, DependencyOptions::default());
        let second = graph.add_dependency(scene.clone(), act.clone(), DependencyType::BelongsTo, DependencyOptions::default());
        let other = graph.add_dependency(scene, act, DependencyType::References, DependencyOptions::default());

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(graph.dependency_count(), 2);
    }

    #[test]
    fn test_remove_dependency_cleans_both_indices() {
        let mut graph = graph();
        let scene = entity(EntityType::Scene, "s1");
        let character = entity(EntityType::Character, "c1");
        let id = graph.add_dependency(scene.clone(), character.clone(), DependencyType::References, DependencyOptions::default());

        assert!(graph.remove_dependency(id));
        assert!(!graph.remove_dependency(id));

        assert!(graph.get_dependencies(&scene).is_empty());
        assert!(graph.get_dependents(&character).is_empty());
        assert!(graph.dependencies().is_empty());
    }

    #[test]
    fn test_remove_entity_dependencies_removes_incoming_and_outgoing() {
        // Arrange
        let mut graph = graph();
        let scene = entity(EntityType::Scene, "s1");
        let character = entity(EntityType::Character, "c1");
        let act = entity(EntityType::Act, "a1");
        let beat = entity(EntityType::Beat, "b1");
        graph.add_dependency(scene.clone(), character.clone(), DependencyType::References, DependencyOptions::default());
        graph.add_dependency(scene.clone(), act.clone(), DependencyType::BelongsTo, DependencyOptions::default());
        graph.add_dependency(beat.clone(), scene.clone(), DependencyType::References, DependencyOptions::default());
        graph.add_dependency(beat.clone(), act.clone(), DependencyType::BelongsTo, DependencyOptions::default());

        // Act
        let removed = graph.remove_entity_dependencies(&scene);

        // Assert
        assert_eq!(removed, 3);
        assert_eq!(graph.dependency_count(), 1);
        assert!(graph.get_dependents(&character).is_empty());
        assert_eq!(graph.get_dependents(&act).len(), 1);
    }

    #[test]
    fn test_analyze_impact_marks_referencing_scene_direct() {
        // Arrange
        let mut graph = graph();
        let scene = entity(EntityType::Scene, "s1");
        let character = entity(EntityType::Character, "c1");
        graph.add_dependency(scene.clone(), character.clone(), DependencyType::References, DependencyOptions::default());

        // Act
        let analysis = graph.analyze_impact(&character, EventType::CharacterDeleted);

        // Assert
        let node = analysis
            .affected_entities
            .iter()
            .find(|n| n.entity == scene)
            .expect("scene should be affected");
        assert_eq!(node.impact_level, ImpactLevel::Direct);
        assert_eq!(node.suggested_action, SuggestedAction::Review);
        assert_eq!(node.dependency_path, vec!["c1".to_owned(), "s1".to_owned()]);
        assert_eq!(analysis.total_affected, analysis.affected_entities.len());
        assert_eq!(analysis.event_type, EventType::CharacterDeleted);
    }

    #[test]
    fn test_static_rule_skipped_when_direct_node_covers_type() {
        let mut graph = graph();
        let scene = entity(EntityType::Scene, "s1");
        let character = entity(EntityType::Character, "c1");
        graph.add_dependency(scene, character.clone(), DependencyType::References, DependencyOptions::default());

        let analysis = graph.analyze_impact(&character, EventType::CharacterUpdated);

        let scene_nodes: Vec<&ImpactNode> = analysis
            .affected_entities
            .iter()
            .filter(|n| n.entity.entity_type == EntityType::Scene)
            .collect();
        assert_eq!(scene_nodes.len(), 1);
        assert_eq!(scene_nodes[0].entity.id, "s1");
        let wildcard_types: Vec<EntityType> = analysis
            .affected_entities
            .iter()
            .filter(|n| n.entity.id == WILDCARD_ENTITY_ID)
            .map(|n| n.entity.entity_type)
            .collect();
        assert_eq!(
            wildcard_types,
            vec![EntityType::Relationship, EntityType::Faction, EntityType::Beat]
        );
    }

    #[test]
    fn test_indirect_dependents_carry_full_path() {
        // Arrange: beat -> scene -> character
        let mut graph = graph();
        let character = entity(EntityType::Character, "c1");
        let scene = entity(EntityType::Scene, "s1");
        let beat = entity(EntityType::Beat, "b1");
        graph.add_dependency(scene.clone(), character.clone(), DependencyType::References, DependencyOptions::default());
        graph.add_dependency(beat.clone(), scene, DependencyType::Affects, DependencyOptions::default());

        // Act
        let analysis = graph.analyze_impact(&character, EventType::CharacterUpdated);

        // Assert
        let node = analysis
            .affected_entities
            .iter()
            .find(|n| n.entity == beat)
            .unwrap();
        assert_eq!(node.impact_level, ImpactLevel::Indirect);
        assert_eq!(node.suggested_action, SuggestedAction::Regenerate);
        assert_eq!(node.dependency_path, vec!["c1", "s1", "b1"]);
    }

    #[test]
    fn test_traversal_terminates_on_cycles() {
        let mut graph = graph();
        let a = entity(EntityType::Beat, "a");
        let b = entity(EntityType::Beat, "b");
        let c = entity(EntityType::Beat, "c");
        graph.add_dependency(b.clone(), a.clone(), DependencyType::Requires, DependencyOptions::default());
        graph.add_dependency(c.clone(), b.clone(), DependencyType::Requires, DependencyOptions::default());
        graph.add_dependency(a.clone(), c.clone(), DependencyType::Requires, DependencyOptions::default());

        let analysis = graph.analyze_impact(&a, EventType::BeatUpdated);
        let doomed = graph.get_delete_impact(&a);

        let graph_nodes = analysis
            .affected_entities
            .iter()
            .filter(|n| n.entity.id != WILDCARD_ENTITY_ID)
            .count();
        assert_eq!(graph_nodes, 2);
        assert_eq!(doomed, vec![b, c]);
    }

    #[test]
    fn test_traversal_respects_depth_bound() {
        // Arrange: a chain of 15 beats, each requiring the previous one.
        let mut graph = graph().with_max_traversal_depth(3);
        let beats: Vec<EntityReference> = (0..15)
            .map(|n| entity(EntityType::Beat, &format!("b{n}")))
            .collect();
        for pair in beats.windows(2) {
            graph.add_dependency(pair[1].clone(), pair[0].clone(), DependencyType::Requires, DependencyOptions::default());
        }

        // Act
        let analysis = graph.analyze_impact(&beats[0], EventType::BeatUpdated);

        // Assert
        let reached: Vec<&str> = analysis
            .affected_entities
            .iter()
            .filter(|n| n.entity.entity_type == EntityType::Beat)
            .map(|n| n.entity.id.as_str())
            .collect();
        assert_eq!(reached, vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_delete_impact_follows_only_cascading_edges() {
        // Arrange
        let mut graph = graph();
        let beat_a = entity(EntityType::Beat, "a");
        let beat_b = entity(EntityType::Beat, "b");
        let scene_x = entity(EntityType::Scene, "x");
        let character_y = entity(EntityType::Character, "y");
        graph.add_dependency(beat_b.clone(), beat_a.clone(), DependencyType::Requires, DependencyOptions::default());
        graph.add_dependency(scene_x.clone(), character_y.clone(), DependencyType::References, DependencyOptions::default());

        // Act / Assert
        assert_eq!(graph.get_delete_impact(&beat_a), vec![beat_b]);
        assert!(!graph.get_delete_impact(&character_y).contains(&scene_x));
    }

    #[test]
    fn test_delete_impact_is_transitive_through_belongs_to() {
        let mut graph = graph();
        let project = entity(EntityType::Project, "p");
        let act = entity(EntityType::Act, "a");
        let scene = entity(EntityType::Scene, "s");
        let character = entity(EntityType::Character, "c");
        graph.add_dependency(act.clone(), project.clone(), DependencyType::BelongsTo, DependencyOptions::default());
        graph.add_dependency(scene.clone(), act.clone(), DependencyType::BelongsTo, DependencyOptions::default());
        graph.add_dependency(scene.clone(), character, DependencyType::References, DependencyOptions::default());

        assert_eq!(graph.get_delete_impact(&project), vec![act, scene]);
    }

    #[test]
    fn test_register_entity_dependencies_uses_rule_table() {
        // Arrange
        let mut graph = graph();
        let scene = entity(EntityType::Scene, "s1");
        let related = vec![
            entity(EntityType::Project, "p1"),
            entity(EntityType::Act, "a1"),
            entity(EntityType::Character, "c1"),
            entity(EntityType::Faction, "f1"),
        ];

        // Act
        let ids = graph.register_entity_dependencies(&scene, &related);

        // Assert
        assert_eq!(ids.len(), 3);
        let types: Vec<DependencyType> = graph
            .get_dependencies(&scene)
            .iter()
            .map(|d| d.dependency_type)
            .collect();
        assert_eq!(
            types,
            vec![DependencyType::BelongsTo, DependencyType::BelongsTo, DependencyType::References]
        );
    }

    #[test]
    fn test_subgraph_walks_both_directions_within_depth() {
        // Arrange: beat -> scene -> act -> project
        let mut graph = graph();
        let beat = entity(EntityType::Beat, "b");
        let scene = entity(EntityType::Scene, "s");
        let act = entity(EntityType::Act, "a");
        let project = entity(EntityType::Project, "p");
        graph.add_dependency(beat.clone(), scene.clone(), DependencyType::References, DependencyOptions::default());
        graph.add_dependency(scene.clone(), act.clone(), DependencyType::BelongsTo, DependencyOptions::default());
        graph.add_dependency(act, project, DependencyType::BelongsTo, DependencyOptions::default());

        // Act
        let subgraph = graph.get_subgraph(&scene, 1);

        // Assert
        let keys: Vec<&str> = subgraph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(keys, vec!["scene:s", "act:a", "beat:b"]);
        assert_eq!(subgraph.edges.len(), 2);
    }

    #[test]
    fn test_export_deduplicates_nodes() {
        let mut graph = graph();
        let character = entity(EntityType::Character, "c1").with_name("Mara");
        for scene_id in ["s1", "s2"] {
            graph.add_dependency(entity(EntityType::Scene, scene_id), character.clone(), DependencyType::References, DependencyOptions::default());
        }

        let export = graph.export_for_visualization();

        assert_eq!(export.nodes.len(), 3);
        assert_eq!(export.edges.len(), 2);
        let mara = export.nodes.iter().find(|n| n.id == "character:c1").unwrap();
        assert_eq!(mara.label, "Mara");
    }

    #[test]
    fn test_restore_rebuilds_indices() {
        let mut source = graph();
        let scene = entity(EntityType::Scene, "s1");
        let character = entity(EntityType::Character, "c1");
        source.add_dependency(scene.clone(), character.clone(), DependencyType::References, DependencyOptions::default());
        let saved: Vec<Dependency> = source.dependencies().into_iter().cloned().collect();

        let mut restored = graph();
        restored.restore(saved);

        assert_eq!(restored.get_dependents(&character).len(), 1);
        assert_eq!(restored.get_dependencies(&scene).len(), 1);
    }
}
