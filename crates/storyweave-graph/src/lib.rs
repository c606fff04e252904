//! Storyweave — entity dependency graph.
//!
//! Models directed, typed relationships between entities and answers two
//! questions: what should be reviewed when an entity changes
//! ([`DependencyGraph::analyze_impact`]) and what cannot survive its deletion
//! ([`DependencyGraph::get_delete_impact`]). The graph may contain cycles;
//! every traversal carries a visited set or a depth bound.

pub mod dependency;
pub mod export;
pub mod graph;
pub mod impact;
pub mod rules;

pub use dependency::{Dependency, DependencyMetadata, DependencyOptions, DependencyStrength, DependencyType};
pub use export::{GraphEdge, GraphExport, GraphNode};
pub use graph::DependencyGraph;
pub use impact::{ImpactAnalysis, ImpactLevel, ImpactNode, SuggestedAction};
