//! Storyweave — typed event bus.
//!
//! Delivers [`CoordinationEvent`](storyweave_core::event::CoordinationEvent)s
//! to matching subscribers in priority order. Emissions can be debounced per
//! key, identical emissions inside the hash window are suppressed, and a
//! handler-driven emission chain that grows past the configured depth
//! abandons the queue so runaway cascades always terminate.

pub mod bus;
mod dedup;
pub mod driver;
pub mod options;
pub mod subscription;
mod timers;

pub use bus::{EventBus, EventBusConfig};
pub use driver::spawn_timer_driver;
pub use options::{AcceptHook, BatchCallback, BatchEntry, BatchSummary, EmitOptions, SubscribeOptions};
pub use subscription::{EventHandler, Subscription};
