//! Storyweave — state store adapters.
//!
//! Implementations of [`StateStore`](storyweave_core::store::StateStore) used
//! by the hub's persistence hooks.

pub mod memory_state_store;
pub mod pg_state_store;
pub mod schema;

pub use memory_state_store::MemoryStateStore;
pub use pg_state_store::PgStateStore;
