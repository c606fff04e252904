//! Storyweave — coordination hub.
//!
//! Composes the [event bus](storyweave_event_bus::EventBus) and the
//! [dependency graph](storyweave_graph::DependencyGraph) behind one facade,
//! and layers on staged changes, undo/redo history, cache-invalidation
//! signals, an activity log and optional persistence through a
//! [`StateStore`](storyweave_core::store::StateStore).

pub mod activity;
pub mod cache;
pub mod history;
pub mod hub;
pub mod persistence;
pub mod staging;

pub use activity::{ActivityEntry, ActivityKind, ActivityLog};
pub use cache::{CacheInvalidationCallback, query_keys};
pub use history::{EventHistoryEntry, UndoContext, UndoData, UndoHistory};
pub use hub::{CoordinationHub, CoordinationHubBuilder, HubBatchEntry, HubEmitOptions};
pub use persistence::PersistedState;
pub use staging::PendingChange;
