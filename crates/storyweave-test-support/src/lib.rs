//! Shared test mocks and utilities for the Storyweave coordination layer.

mod clock;
mod recorder;
mod store;

pub use clock::{FixedClock, ManualClock, fixed_now};
pub use recorder::EventRecorder;
pub use store::{EmptyStateStore, FailingStateStore, RecordingStateStore};
