//! The event bus.
//!
//! Emission is synchronous: `emit` queues the event and drains the queue
//! before returning, unless a batch is open. Only one drain runs at a time.
//! An event emitted by a handler is queued one cascade level below the event
//! that handler is serving, and the running drain dispatches it. A chain that
//! reaches `max_processing_depth` levels drops the whole queue.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use chrono::{DateTime, TimeDelta, Utc};
use storyweave_core::clock::Clock;
use storyweave_core::config::CoordinationConfig;
use storyweave_core::error::CoordinationError;
use storyweave_core::event::{CoordinationEvent, EventMetadata, EventType};
use storyweave_core::payload::BaseEventPayload;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::dedup::{RecentHashes, content_hash};
use crate::options::{
    AcceptHook, BatchCallback, BatchEntry, BatchSummary, EmitOptions, SubscribeOptions,
};
use crate::subscription::{EventHandler, Subscription};
use crate::timers::{DebounceTimers, PendingEmission};

/// Limits and windows used by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusConfig {
    /// Default debounce quiet period.
    pub debounce_ms: u64,
    /// Duplicate suppression window.
    pub hash_expiration_ms: u64,
    /// Queue capacity.
    pub max_event_queue_size: usize,
    /// Maximum length of a handler-driven emission chain.
    pub max_processing_depth: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::from(&CoordinationConfig::default())
    }
}

impl From<&CoordinationConfig> for EventBusConfig {
    fn from(config: &CoordinationConfig) -> Self {
        Self {
            debounce_ms: config.debounce_ms,
            hash_expiration_ms: config.hash_expiration_ms,
            max_event_queue_size: config.max_event_queue_size,
            max_processing_depth: config.max_processing_depth,
        }
    }
}

fn millis(ms: u64) -> TimeDelta {
    TimeDelta::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
}

#[derive(Debug)]
struct OpenBatch {
    id: Uuid,
    depth: usize,
    deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct BatchProgress {
    remaining: usize,
    closed: bool,
    event_ids: Vec<Uuid>,
}

/// The event whose handlers are running.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    thread: ThreadId,
    cascade_depth: usize,
}

#[derive(Debug, Default)]
struct BusState {
    queue: Vec<CoordinationEvent>,
    subscriptions: Vec<Subscription>,
    draining: bool,
    in_flight: Option<InFlight>,
    hashes: RecentHashes,
    timers: DebounceTimers,
    open_batch: Option<OpenBatch>,
    batches: HashMap<Uuid, BatchProgress>,
    completed: Vec<BatchSummary>,
}

impl BusState {
    /// Cascade depth for an emission made now: one below the in-flight event
    /// when called from its handler thread, otherwise a fresh chain.
    fn cascade_depth_for_emission(&self) -> usize {
        match self.in_flight {
            Some(in_flight) if in_flight.thread == thread::current().id() => {
                in_flight.cascade_depth + 1
            }
            _ => 0,
        }
    }

    fn is_held(&self, event: &CoordinationEvent) -> bool {
        match (&self.open_batch, event.metadata.batch_id) {
            (Some(open), Some(batch_id)) => open.id == batch_id,
            _ => false,
        }
    }

    /// Accounts for an event leaving the queue, either dispatched or dropped.
    fn settle(&mut self, event: &CoordinationEvent, dispatched: bool) {
        let Some(batch_id) = event.metadata.batch_id else {
            return;
        };
        let Some(progress) = self.batches.get_mut(&batch_id) else {
            return;
        };
        progress.remaining = progress.remaining.saturating_sub(1);
        if dispatched {
            progress.event_ids.push(event.id);
        }
        if progress.closed && progress.remaining == 0 {
            self.complete_batch(batch_id);
        }
    }

    fn close_batch(&mut self, batch_id: Uuid) {
        let done = match self.batches.get_mut(&batch_id) {
            Some(progress) => {
                progress.closed = true;
                progress.remaining == 0
            }
            None => false,
        };
        if done {
            self.complete_batch(batch_id);
        }
    }

    fn complete_batch(&mut self, batch_id: Uuid) {
        if let Some(progress) = self.batches.remove(&batch_id) {
            self.completed.push(BatchSummary {
                batch_id,
                event_ids: progress.event_ids,
            });
        }
    }
}

/// Releases the drain when a batch callback unwinds out of it.
struct DrainGuard<'a>(&'a EventBus);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut state = self.0.state();
            state.draining = false;
            state.in_flight = None;
        }
    }
}

/// Typed publish/subscribe engine with priority ordering, debouncing,
/// duplicate suppression and a cascade depth guard.
pub struct EventBus {
    config: EventBusConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<BusState>,
    on_batch_complete: Mutex<Option<BatchCallback>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new(config: EventBusConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(BusState::default()),
            on_batch_complete: Mutex::new(None),
        }
    }

    /// Returns the bus configuration.
    #[must_use]
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs the callback invoked once per completed batch.
    pub fn set_on_batch_complete(&self, callback: BatchCallback) {
        *self
            .on_batch_complete
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Registers `handler` for `event_types`. Past events are not replayed.
    pub fn subscribe<F>(&self, event_types: &[EventType], handler: F, options: SubscribeOptions) -> Uuid
    where
        F: Fn(&CoordinationEvent, &EventBus) -> Result<(), CoordinationError> + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        let id = Uuid::new_v4();
        let label = options.label.unwrap_or_else(|| format!("subscription-{id}"));
        debug!(subscription_id = %id, label = %label, "subscribing");
        self.state().subscriptions.push(Subscription {
            id,
            event_types: event_types.to_vec(),
            entity_types: options.entity_types,
            project_id: options.project_id,
            priority: options.priority,
            label,
            handler,
        });
        id
    }

    /// Removes a subscription. Returns `false` if the id is unknown.
    pub fn unsubscribe(&self, subscription_id: Uuid) -> bool {
        let mut state = self.state();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != subscription_id);
        state.subscriptions.len() != before
    }

    /// Emits an event and returns its id.
    ///
    /// The id is returned even when the emission is suppressed as a
    /// duplicate or still waiting on its debounce window.
    pub fn emit(&self, event_type: EventType, payload: BaseEventPayload, options: EmitOptions) -> Uuid {
        self.emit_with_hook(event_type, payload, options, None)
    }

    /// Emits an event, invoking `hook` with the built event once the bus
    /// accepts it into the queue.
    ///
    /// For debounced emissions the hook runs when the timer fires, and only
    /// for the emission that survives. Suppressed duplicates never run it.
    pub fn emit_with_hook(
        &self,
        event_type: EventType,
        payload: BaseEventPayload,
        options: EmitOptions,
        hook: Option<AcceptHook>,
    ) -> Uuid {
        let now = self.clock.now();
        let hash = (options.debounce_key.is_none() && !options.bypass_dedup)
            .then(|| content_hash(event_type, &payload));

        let mut event = CoordinationEvent {
            id: Uuid::new_v4(),
            event_type,
            payload: payload.into_payload(now),
            metadata: EventMetadata {
                created_at: now,
                processed_at: None,
                acknowledged: false,
                retry_count: 0,
                priority: options.priority,
                batch_id: options.batch_id,
                cascade_depth: 0,
            },
        };
        let event_id = event.id;

        let mut state = self.state();
        event.metadata.cascade_depth = state.cascade_depth_for_emission();

        if let Some(key) = options.debounce_key {
            let delay = options.debounce_ms.unwrap_or(self.config.debounce_ms);
            let deadline = now + millis(delay);
            let replaced = state.timers.schedule(
                key.clone(),
                PendingEmission {
                    event,
                    deadline,
                    hook,
                },
            );
            debug!(event_id = %event_id, debounce_key = %key, replaced, "debounced emission scheduled");
            return event_id;
        }

        if let Some(hash) = hash {
            let ttl = millis(self.config.hash_expiration_ms);
            if state.hashes.check_and_record(hash, now, ttl) {
                debug!(event_id = %event_id, event_type = %event_type, "suppressed duplicate emission");
                return event_id;
            }
        }

        let accepted = self.enqueue(&mut state, event);
        drop(state);
        if let Some((accepted, drain)) = accepted {
            self.after_accept(&accepted, hook, drain);
        } else {
            self.notify_completed_batches();
        }
        event_id
    }

    /// Emits `entries` as one batch and returns the batch id.
    ///
    /// The events are held until the last one is queued, then dispatched in
    /// priority order; the batch callback fires once afterwards.
    pub fn emit_batch(&self, entries: Vec<BatchEntry>) -> Uuid {
        let batch_id = self.start_batch(None);
        for entry in entries {
            let options = EmitOptions {
                batch_id: None,
                ..entry.options
            };
            self.emit(entry.event_type, entry.payload, options);
        }
        self.end_batch();
        batch_id
    }

    /// Opens a batch scope, or joins the one already open.
    ///
    /// Emissions without an explicit batch id are tagged and held until the
    /// scope closes. With a window, [`EventBus::fire_due_timers`] closes the
    /// batch once the window elapses.
    pub fn start_batch(&self, window_ms: Option<u64>) -> Uuid {
        let now = self.clock.now();
        let mut state = self.state();
        if let Some(open) = state.open_batch.as_mut() {
            open.depth += 1;
            return open.id;
        }
        let id = Uuid::new_v4();
        state.open_batch = Some(OpenBatch {
            id,
            depth: 1,
            deadline: window_ms.map(|ms| now + millis(ms)),
        });
        state.batches.insert(id, BatchProgress::default());
        debug!(batch_id = %id, "batch opened");
        id
    }

    /// Closes the current batch scope and dispatches its held events.
    ///
    /// Returns the batch id when the outermost scope closed, `None` for an
    /// inner scope or when no batch is open.
    pub fn end_batch(&self) -> Option<Uuid> {
        let closed = {
            let mut state = self.state();
            let open = state.open_batch.as_mut()?;
            open.depth -= 1;
            if open.depth > 0 {
                return None;
            }
            let id = open.id;
            state.open_batch = None;
            state.close_batch(id);
            id
        };
        debug!(batch_id = %closed, "batch closed");
        self.notify_completed_batches();
        self.process_queue();
        Some(closed)
    }

    /// Fires due debounce timers and batch windows. Returns the number of
    /// debounced emissions queued.
    pub fn fire_due_timers(&self) -> usize {
        let now = self.clock.now();
        let (due, window_elapsed) = {
            let mut state = self.state();
            let window_elapsed = state
                .open_batch
                .as_ref()
                .and_then(|open| open.deadline)
                .is_some_and(|deadline| deadline <= now);
            (state.timers.take_due(now), window_elapsed)
        };

        let fired = due.len();
        for pending in due {
            let mut state = self.state();
            let accepted = self.enqueue(&mut state, pending.event);
            drop(state);
            if let Some((accepted, drain)) = accepted {
                self.after_accept(&accepted, pending.hook, drain);
            } else {
                self.notify_completed_batches();
            }
        }

        if window_elapsed {
            if let Some(open) = self.state().open_batch.as_mut() {
                open.depth = 1;
            }
            self.end_batch();
        }
        fired
    }

    /// Earliest pending debounce deadline, if any.
    #[must_use]
    pub fn next_timer_deadline(&self) -> Option<DateTime<Utc>> {
        self.state().timers.next_deadline()
    }

    /// Drains queued events when no drain is in flight. Called from inside a
    /// handler it returns immediately; the enclosing drain finishes the work.
    pub fn flush(&self) {
        let idle_with_work = {
            let state = self.state();
            !state.draining && state.queue.iter().any(|e| !state.is_held(e))
        };
        if idle_with_work {
            self.process_queue();
        }
    }

    /// Number of queued, undispatched events.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state().queue.len()
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    /// Number of debounced emissions waiting on their timers.
    #[must_use]
    pub fn pending_timer_count(&self) -> usize {
        self.state().timers.len()
    }

    /// Cascade level of the event being dispatched, counting from one.
    /// Zero when no handler is running.
    #[must_use]
    pub fn processing_depth(&self) -> usize {
        self.state()
            .in_flight
            .map_or(0, |in_flight| in_flight.cascade_depth + 1)
    }

    /// Whether a batch scope is open.
    #[must_use]
    pub fn is_batching(&self) -> bool {
        self.state().open_batch.is_some()
    }

    /// Clears the queue, subscriptions, timers, hashes and batches.
    pub fn reset(&self) {
        let mut state = self.state();
        state.queue.clear();
        state.subscriptions.clear();
        state.hashes.clear();
        state.timers.clear();
        state.open_batch = None;
        state.batches.clear();
        state.completed.clear();
        debug!("event bus reset");
    }

    /// Tears the bus down: cancels every pending timer and drops all
    /// subscriptions and the batch callback.
    pub fn destroy(&self) {
        let cancelled = self.pending_timer_count();
        self.reset();
        *self
            .on_batch_complete
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        info!(cancelled_timers = cancelled, "event bus destroyed");
    }

    /// Tags, bounds and pushes an accepted event. Returns a copy for the
    /// accept hook and whether the queue should drain now, or `None` when the
    /// event ends a chain that is too deep and the queue was dropped.
    fn enqueue(
        &self,
        state: &mut BusState,
        mut event: CoordinationEvent,
    ) -> Option<(CoordinationEvent, bool)> {
        if event.metadata.cascade_depth >= self.config.max_processing_depth {
            let dropped: Vec<CoordinationEvent> = state.queue.drain(..).collect();
            for stale in &dropped {
                state.settle(stale, false);
            }
            error!(
                event_id = %event.id,
                event_type = %event.event_type,
                depth = event.metadata.cascade_depth + 1,
                max_depth = self.config.max_processing_depth,
                dropped = dropped.len(),
                "event cascade exceeded maximum processing depth; queue cleared"
            );
            return None;
        }

        if event.metadata.batch_id.is_none() {
            if let Some(open) = &state.open_batch {
                event.metadata.batch_id = Some(open.id);
            }
        }
        if let Some(batch_id) = event.metadata.batch_id {
            if let Some(progress) = state.batches.get_mut(&batch_id) {
                progress.remaining += 1;
            }
        }

        if state.queue.len() >= self.config.max_event_queue_size {
            let drop_count = (state.queue.len() / 2).max(1);
            let dropped: Vec<CoordinationEvent> = state.queue.drain(..drop_count).collect();
            for stale in &dropped {
                state.settle(stale, false);
            }
            warn!(
                dropped = drop_count,
                capacity = self.config.max_event_queue_size,
                "event queue overflow; dropped oldest events"
            );
        }

        let drain = !state.draining && !state.is_held(&event);
        state.queue.push(event.clone());
        Some((event, drain))
    }

    fn after_accept(&self, accepted: &CoordinationEvent, hook: Option<AcceptHook>, drain: bool) {
        if let Some(hook) = hook {
            hook(accepted);
        }
        self.notify_completed_batches();
        if drain {
            self.process_queue();
        }
    }

    /// Drains the queue unless another drain is already running, in which
    /// case that drain picks up whatever was queued.
    fn process_queue(&self) {
        {
            let mut state = self.state();
            if state.draining {
                return;
            }
            state.draining = true;
        }
        let _guard = DrainGuard(self);

        while let Some((mut event, handlers)) = self.next_dispatch() {
            event.metadata.processed_at = Some(self.clock.now());
            self.dispatch(&event, &handlers);
            event.metadata.acknowledged = true;
            {
                let mut state = self.state();
                state.in_flight = None;
                state.settle(&event, true);
            }
            self.notify_completed_batches();
        }
    }

    /// Pops the next dispatchable event, re-sorting the queue by priority
    /// then creation time, and collects its matching handlers. Ends the
    /// drain when nothing is dispatchable.
    fn next_dispatch(&self) -> Option<(CoordinationEvent, Vec<(String, EventHandler)>)> {
        let mut state = self.state();
        state
            .queue
            .sort_by_key(|e| (e.metadata.priority.rank(), e.metadata.created_at));
        let Some(position) = state.queue.iter().position(|e| !state.is_held(e)) else {
            state.draining = false;
            return None;
        };
        let event = state.queue.remove(position);
        state.in_flight = Some(InFlight {
            thread: thread::current().id(),
            cascade_depth: event.metadata.cascade_depth,
        });

        let mut matching: Vec<&Subscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.matches(&event))
            .collect();
        matching.sort_by_key(|s| std::cmp::Reverse(s.priority));
        let handlers = matching
            .into_iter()
            .map(|s| (s.label.clone(), Arc::clone(&s.handler)))
            .collect();
        Some((event, handlers))
    }

    fn dispatch(&self, event: &CoordinationEvent, handlers: &[(String, EventHandler)]) {
        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            handlers = handlers.len(),
            "dispatching event"
        );
        for (label, handler) in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(event, self)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        subscription = %label,
                        event_id = %event.id,
                        event_type = %event.event_type,
                        error = %e,
                        "subscriber handler failed"
                    );
                }
                Err(_) => {
                    error!(
                        subscription = %label,
                        event_id = %event.id,
                        event_type = %event.event_type,
                        "subscriber handler panicked"
                    );
                }
            }
        }
    }

    fn notify_completed_batches(&self) {
        let completed = std::mem::take(&mut self.state().completed);
        if completed.is_empty() {
            return;
        }
        let callback = self
            .on_batch_complete
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for summary in completed {
            debug!(batch_id = %summary.batch_id, events = summary.event_ids.len(), "batch complete");
            if let Some(callback) = &callback {
                callback(&summary);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use storyweave_core::entity::EntityType;
    use storyweave_core::event::Priority;
    use storyweave_core::payload::EntityDetails;
    use storyweave_test_support::{EventRecorder, ManualClock};

    use super::*;

    fn character(id: &str) -> BaseEventPayload {
        BaseEventPayload::new(id, "p1", EntityDetails::empty(EntityType::Character))
    }

    fn bus_with(config: EventBusConfig) -> (EventBus, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (EventBus::new(config, clock.clone()), clock)
    }

    fn recording(bus: &EventBus, event_types: &[EventType]) -> EventRecorder {
        let recorder = EventRecorder::new();
        let sink = recorder.clone();
        bus.subscribe(
            event_types,
            move |event, _| {
                sink.record(event);
                Ok(())
            },
            SubscribeOptions::default(),
        );
        recorder
    }

    #[test]
    fn test_emit_delivers_to_matching_subscriber_once() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::CharacterCreated]);

        // Act
        let id = bus.emit(EventType::CharacterCreated, character("c1"), EmitOptions::default());

        // Assert
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, id);
        assert!(events[0].metadata.processed_at.is_some());
        assert_eq!(bus.queue_len(), 0);
    }

    #[test]
    fn test_subscriber_does_not_receive_other_event_types() {
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::SceneCreated]);

        bus.emit(EventType::CharacterCreated, character("c1"), EmitOptions::default());

        assert!(recorder.is_empty());
    }

    #[test]
    fn test_entity_type_and_project_filters_are_applied() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = EventRecorder::new();
        let sink = recorder.clone();
        bus.subscribe(
            &EventType::ALL,
            move |event, _| {
                sink.record(event);
                Ok(())
            },
            SubscribeOptions {
                entity_types: Some(vec![EntityType::Character]),
                project_id: Some("p1".to_owned()),
                ..SubscribeOptions::default()
            },
        );

        // Act
        bus.emit(EventType::CharacterUpdated, character("c1"), EmitOptions::default());
        bus.emit(
            EventType::CharacterUpdated,
            BaseEventPayload::new("c2", "p2", EntityDetails::empty(EntityType::Character)),
            EmitOptions::default(),
        );
        bus.emit(
            EventType::SceneUpdated,
            BaseEventPayload::new("s1", "p1", EntityDetails::empty(EntityType::Scene)),
            EmitOptions::default(),
        );

        // Assert
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.entity_id, "c1");
    }

    #[test]
    fn test_handlers_run_in_descending_subscription_priority() {
        let (bus, _) = bus_with(EventBusConfig::default());
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, priority) in [("low", 1), ("high", 100), ("mid", 50)] {
            let order = Arc::clone(&order);
            bus.subscribe(
                &[EventType::ActCreated],
                move |_, _| {
                    order.lock().unwrap().push(label);
                    Ok(())
                },
                SubscribeOptions {
                    priority,
                    ..SubscribeOptions::default()
                },
            );
        }

        bus.emit(
            EventType::ActCreated,
            BaseEventPayload::new("a1", "p1", EntityDetails::empty(EntityType::Act)),
            EmitOptions::default(),
        );

        assert_eq!(*order.lock().unwrap(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        bus.subscribe(
            &[EventType::BeatCreated],
            |_, _| Err(CoordinationError::Handler("boom".into())),
            SubscribeOptions {
                priority: 10,
                ..SubscribeOptions::default()
            },
        );
        bus.subscribe(
            &[EventType::BeatCreated],
            |_, _| panic!("handler bug"),
            SubscribeOptions {
                priority: 5,
                ..SubscribeOptions::default()
            },
        );
        let recorder = recording(&bus, &[EventType::BeatCreated]);

        // Act
        bus.emit(
            EventType::BeatCreated,
            BaseEventPayload::new("b1", "p1", EntityDetails::empty(EntityType::Beat)),
            EmitOptions::default(),
        );

        // Assert
        assert_eq!(recorder.len(), 1);
        assert_eq!(bus.processing_depth(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = EventRecorder::new();
        let sink = recorder.clone();
        let id = bus.subscribe(
            &[EventType::CharacterCreated],
            move |event, _| {
                sink.record(event);
                Ok(())
            },
            SubscribeOptions::default(),
        );

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(EventType::CharacterCreated, character("c1"), EmitOptions::default());

        assert!(recorder.is_empty());
    }

    #[test]
    fn test_debounce_delivers_only_last_payload_after_quiet_period() {
        // Arrange
        let (bus, clock) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::CharacterUpdated]);

        // Act
        for name in ["A", "An", "Ann"] {
            bus.emit(
                EventType::CharacterUpdated,
                character("c1").with_change("name", None, json!(name)),
                EmitOptions::debounced("character:c1"),
            );
            clock.advance_ms(50);
            bus.fire_due_timers();
        }
        assert!(recorder.is_empty());
        assert_eq!(bus.pending_timer_count(), 1);
        clock.advance_ms(50);
        let fired = bus.fire_due_timers();

        // Assert
        assert_eq!(fired, 1);
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload.changes["name"].new, json!("Ann"));
        assert_eq!(bus.next_timer_deadline(), None);
    }

    #[test]
    fn test_debounce_respects_custom_window() {
        let (bus, clock) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::SceneUpdated]);

        bus.emit(
            EventType::SceneUpdated,
            BaseEventPayload::new("s1", "p1", EntityDetails::empty(EntityType::Scene)),
            EmitOptions {
                debounce_key: Some("scene:s1".into()),
                debounce_ms: Some(300),
                ..EmitOptions::default()
            },
        );
        clock.advance_ms(299);
        bus.fire_due_timers();
        assert!(recorder.is_empty());
        clock.advance_ms(1);
        bus.fire_due_timers();

        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_identical_emissions_within_window_are_suppressed() {
        // Arrange
        let (bus, clock) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::CharacterUpdated]);
        let payload = character("c1").with_change("age", Some(json!(30)), json!(31));

        // Act
        bus.emit(EventType::CharacterUpdated, payload.clone(), EmitOptions::default());
        clock.advance_ms(1000);
        bus.emit(EventType::CharacterUpdated, payload.clone(), EmitOptions::default());
        clock.advance_ms(5000);
        bus.emit(EventType::CharacterUpdated, payload, EmitOptions::default());

        // Assert
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_bypass_dedup_delivers_identical_emission() {
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::CharacterCreated]);
        let options = EmitOptions {
            bypass_dedup: true,
            ..EmitOptions::default()
        };

        bus.emit(EventType::CharacterCreated, character("c1"), options.clone());
        bus.emit(EventType::CharacterCreated, character("c1"), options);

        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_batch_dispatches_by_priority_then_fifo() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &EventType::ALL);

        // Act
        bus.start_batch(None);
        for (id, priority) in [
            ("low", Priority::Low),
            ("normal-1", Priority::Normal),
            ("high", Priority::High),
            ("normal-2", Priority::Normal),
        ] {
            bus.emit(
                EventType::CharacterCreated,
                character(id),
                EmitOptions::with_priority(priority),
            );
        }
        assert!(recorder.is_empty());
        bus.end_batch();

        // Assert
        let order: Vec<String> = recorder
            .events()
            .into_iter()
            .map(|e| e.payload.entity_id)
            .collect();
        assert_eq!(order, vec!["high", "normal-1", "normal-2", "low"]);
    }

    #[test]
    fn test_high_priority_emitted_mid_drain_jumps_ahead() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &EventType::ALL);
        bus.subscribe(
            &[EventType::SceneCreated],
            |event, bus| {
                if event.payload.entity_id == "first" {
                    bus.start_batch(None);
                    bus.emit(EventType::BeatCreated, BaseEventPayload::new("late-low", "p1", EntityDetails::empty(EntityType::Beat)), EmitOptions::with_priority(Priority::Low));
                    bus.emit(EventType::BeatCreated, BaseEventPayload::new("urgent", "p1", EntityDetails::empty(EntityType::Beat)), EmitOptions::with_priority(Priority::High));
                    bus.end_batch();
                }
                Ok(())
            },
            SubscribeOptions::default(),
        );

        // Act
        bus.emit(
            EventType::SceneCreated,
            BaseEventPayload::new("first", "p1", EntityDetails::empty(EntityType::Scene)),
            EmitOptions::default(),
        );

        // Assert
        let order: Vec<String> = recorder
            .events()
            .into_iter()
            .map(|e| e.payload.entity_id)
            .collect();
        assert_eq!(order, vec!["first", "urgent", "late-low"]);
    }

    #[test]
    fn test_emit_batch_reports_completion_once() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        let summaries = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&summaries);
        bus.set_on_batch_complete(Arc::new(move |summary: &BatchSummary| {
            sink.lock().unwrap().push(summary.clone());
        }));
        let entries = ["c1", "c2", "c3"]
            .into_iter()
            .map(|id| BatchEntry {
                event_type: EventType::CharacterCreated,
                payload: character(id),
                options: EmitOptions::default(),
            })
            .collect();

        // Act
        let batch_id = bus.emit_batch(entries);

        // Assert
        let summaries = summaries.lock().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].batch_id, batch_id);
        assert_eq!(summaries[0].event_ids.len(), 3);
        assert!(!bus.is_batching());
    }

    #[test]
    fn test_batch_window_closes_on_timer() {
        let (bus, clock) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::CharacterCreated]);

        bus.start_batch(Some(200));
        bus.emit(EventType::CharacterCreated, character("c1"), EmitOptions::default());
        clock.advance_ms(199);
        bus.fire_due_timers();
        assert!(recorder.is_empty());
        clock.advance_ms(1);
        bus.fire_due_timers();

        assert_eq!(recorder.len(), 1);
        assert!(!bus.is_batching());
    }

    #[test]
    fn test_nested_batch_scopes_close_with_outermost() {
        let (bus, _) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::CharacterCreated]);

        let outer = bus.start_batch(None);
        let inner = bus.start_batch(None);
        bus.emit(EventType::CharacterCreated, character("c1"), EmitOptions::default());

        assert_eq!(outer, inner);
        assert_eq!(bus.end_batch(), None);
        assert!(recorder.is_empty());
        assert_eq!(bus.end_batch(), Some(outer));
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_queue_overflow_drops_oldest_half() {
        // Arrange
        let config = EventBusConfig {
            max_event_queue_size: 4,
            ..EventBusConfig::default()
        };
        let (bus, _) = bus_with(config);
        let recorder = recording(&bus, &[EventType::CharacterCreated]);

        // Act
        bus.start_batch(None);
        for n in 0..5 {
            bus.emit(
                EventType::CharacterCreated,
                character(&format!("c{n}")),
                EmitOptions::default(),
            );
        }
        assert_eq!(bus.queue_len(), 3);
        bus.end_batch();

        // Assert
        let ids: Vec<String> = recorder
            .events()
            .into_iter()
            .map(|e| e.payload.entity_id)
            .collect();
        assert_eq!(ids, vec!["c2", "c3", "c4"]);
    }

    #[test]
    fn test_cascade_beyond_max_depth_clears_queue() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.subscribe(
            &[EventType::CharacterUpdated],
            move |event, bus| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                bus.emit(
                    EventType::CharacterUpdated,
                    BaseEventPayload::new(
                        event.payload.entity_id.clone(),
                        "p1",
                        EntityDetails::empty(EntityType::Character),
                    )
                    .with_change("step", None, json!(n + 1)),
                    EmitOptions::default(),
                );
                Ok(())
            },
            SubscribeOptions::default(),
        );

        // Act
        bus.emit(EventType::CharacterUpdated, character("c1"), EmitOptions::default());

        // Assert
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(bus.queue_len(), 0);
        assert_eq!(bus.processing_depth(), 0);
    }

    #[test]
    fn test_identical_re_emission_from_handler_is_suppressed() {
        let (bus, _) = bus_with(EventBusConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        bus.subscribe(
            &[EventType::CharacterUpdated],
            move |_, bus| {
                counter.fetch_add(1, Ordering::SeqCst);
                bus.emit(EventType::CharacterUpdated, character("c1"), EmitOptions::default());
                Ok(())
            },
            SubscribeOptions::default(),
        );

        bus.emit(EventType::CharacterUpdated, character("c1"), EmitOptions::default());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_accept_hook_runs_before_dispatch() {
        // Arrange
        let (bus, _) = bus_with(EventBusConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&seen);
        bus.subscribe(
            &[EventType::ActCreated],
            move |_, _| {
                handler_log.lock().unwrap().push("handler");
                Ok(())
            },
            SubscribeOptions::default(),
        );
        let hook_log = Arc::clone(&seen);

        // Act
        bus.emit_with_hook(
            EventType::ActCreated,
            BaseEventPayload::new("a1", "p1", EntityDetails::empty(EntityType::Act)),
            EmitOptions::default(),
            Some(Box::new(move |_| hook_log.lock().unwrap().push("hook"))),
        );

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec!["hook", "handler"]);
    }

    #[test]
    fn test_destroy_cancels_pending_timers_and_subscriptions() {
        let (bus, clock) = bus_with(EventBusConfig::default());
        let recorder = recording(&bus, &[EventType::CharacterUpdated]);
        bus.emit(
            EventType::CharacterUpdated,
            character("c1"),
            EmitOptions::debounced("k"),
        );

        bus.destroy();
        clock.advance_ms(500);

        assert_eq!(bus.fire_due_timers(), 0);
        assert_eq!(bus.subscription_count(), 0);
        assert!(recorder.is_empty());
    }
}
