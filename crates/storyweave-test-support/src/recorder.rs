//! Event recorder — captures delivered events for assertions.

use std::sync::{Arc, Mutex};

use storyweave_core::event::{CoordinationEvent, EventType};

/// Collects every event handed to [`EventRecorder::record`].
///
/// Cloning shares the underlying buffer, so a clone can be moved into a
/// subscriber closure while the test keeps the original.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<CoordinationEvent>>>,
}

impl EventRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivered event.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn record(&self, event: &CoordinationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    /// Returns a snapshot of all recorded events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<CoordinationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns the recorded event types in delivery order.
    #[must_use]
    pub fn event_types(&self) -> Vec<EventType> {
        self.events().iter().map(|e| e.event_type).collect()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events().len()
    }

    /// Returns `true` when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
