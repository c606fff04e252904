//! The coordination hub.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use storyweave_core::clock::{Clock, SystemClock};
use storyweave_core::config::CoordinationConfig;
use storyweave_core::entity::EntityReference;
use storyweave_core::error::CoordinationError;
use storyweave_core::event::{CoordinationEvent, EventType};
use storyweave_core::payload::{BaseEventPayload, EventSource};
use storyweave_core::store::StateStore;
use storyweave_event_bus::{
    AcceptHook, BatchCallback, EmitOptions, EventBus, EventBusConfig, SubscribeOptions,
};
use storyweave_graph::{
    Dependency, DependencyGraph, DependencyOptions, DependencyType, GraphExport, ImpactAnalysis,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::activity::{ActivityEntry, ActivityKind, ActivityLog};
use crate::cache::{CacheInvalidationCallback, query_keys};
use crate::history::{EventHistoryEntry, UndoContext, UndoData, UndoHistory};
use crate::persistence::PersistedState;
use crate::staging::{PendingChange, StagingArea};

/// Subscription priority of the built-in cache-invalidation handler.
pub const CACHE_INVALIDATION_PRIORITY: i32 = 100;

const CACHE_INVALIDATION_LABEL: &str = "cache-invalidation";

/// Options for [`CoordinationHub::emit`].
#[derive(Debug, Clone)]
pub struct HubEmitOptions {
    /// Bus options.
    pub emit: EmitOptions,
    /// Record the event on the undo stack.
    pub undoable: bool,
    /// Pre-change state for reversing this event.
    pub undo_data: Option<UndoData>,
}

impl Default for HubEmitOptions {
    fn default() -> Self {
        Self {
            emit: EmitOptions::default(),
            undoable: true,
            undo_data: None,
        }
    }
}

impl HubEmitOptions {
    /// Options for an emission that is not recorded for undo.
    #[must_use]
    pub fn not_undoable() -> Self {
        Self {
            undoable: false,
            ..Self::default()
        }
    }

    /// Options carrying reversal data.
    #[must_use]
    pub fn with_undo_data(undo_data: UndoData) -> Self {
        Self {
            undo_data: Some(undo_data),
            ..Self::default()
        }
    }
}

/// One emission inside [`CoordinationHub::emit_batch`].
#[derive(Debug, Clone)]
pub struct HubBatchEntry {
    pub event_type: EventType,
    pub payload: BaseEventPayload,
    pub options: HubEmitOptions,
}

struct Journal {
    history: UndoHistory,
    activity: ActivityLog,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a [`CoordinationHub`].
pub struct CoordinationHubBuilder {
    config: CoordinationConfig,
    clock: Option<Arc<dyn Clock>>,
    on_cache_invalidation: Option<CacheInvalidationCallback>,
    on_batch_complete: Option<BatchCallback>,
    store: Option<Arc<dyn StateStore>>,
}

impl CoordinationHubBuilder {
    /// Time source for the bus, the graph and the hub. Defaults to the
    /// system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Receives the query keys invalidated by every dispatched event.
    #[must_use]
    pub fn on_cache_invalidation<F>(mut self, callback: F) -> Self
    where
        F: Fn(Vec<Vec<String>>) + Send + Sync + 'static,
    {
        self.on_cache_invalidation = Some(Arc::new(callback));
        self
    }

    /// Runs once every event of a closed batch has been dispatched.
    #[must_use]
    pub fn on_batch_complete(mut self, callback: BatchCallback) -> Self {
        self.on_batch_complete = Some(callback);
        self
    }

    /// Store used by `save_state`, `load_state` and `reset` when persistence
    /// is enabled.
    #[must_use]
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn build(self) -> CoordinationHub {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let bus = Arc::new(EventBus::new(
            EventBusConfig::from(&self.config),
            Arc::clone(&clock),
        ));
        if let Some(callback) = self.on_batch_complete {
            bus.set_on_batch_complete(callback);
        }
        let graph = DependencyGraph::new(Arc::clone(&clock))
            .with_max_traversal_depth(self.config.max_traversal_depth);
        let journal = Journal {
            history: UndoHistory::new(self.config.max_undo_history),
            activity: ActivityLog::new(self.config.max_activity_log_size),
        };

        let hub = CoordinationHub {
            config: self.config,
            clock,
            bus,
            graph: Mutex::new(graph),
            journal: Arc::new(Mutex::new(journal)),
            staging: Mutex::new(StagingArea::default()),
            store: self.store,
            on_cache_invalidation: self.on_cache_invalidation,
            cache_subscription: Mutex::new(None),
        };
        hub.subscribe_cache_invalidation();
        hub
    }
}

/// Orchestration facade over the event bus and the dependency graph.
///
/// Owned by the composition root; there is no global instance. Every
/// method takes `&self`, so the hub can be shared behind an `Arc`.
pub struct CoordinationHub {
    config: CoordinationConfig,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    graph: Mutex<DependencyGraph>,
    journal: Arc<Mutex<Journal>>,
    staging: Mutex<StagingArea>,
    store: Option<Arc<dyn StateStore>>,
    on_cache_invalidation: Option<CacheInvalidationCallback>,
    cache_subscription: Mutex<Option<Uuid>>,
}

impl std::fmt::Debug for CoordinationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationHub")
            .field("config", &self.config)
            .field("persistence", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl CoordinationHub {
    #[must_use]
    pub fn builder(config: CoordinationConfig) -> CoordinationHubBuilder {
        CoordinationHubBuilder {
            config,
            clock: None,
            on_cache_invalidation: None,
            on_batch_complete: None,
            store: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CoordinationConfig {
        &self.config
    }

    /// The underlying bus, e.g. for [`storyweave_event_bus::spawn_timer_driver`].
    #[must_use]
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Id of the built-in cache-invalidation subscription, while active.
    #[must_use]
    pub fn cache_subscription(&self) -> Option<Uuid> {
        *lock(&self.cache_subscription)
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        lock(&self.journal)
    }

    fn graph(&self) -> MutexGuard<'_, DependencyGraph> {
        lock(&self.graph)
    }

    fn subscribe_cache_invalidation(&self) {
        let callback = self.on_cache_invalidation.clone();
        let id = self.bus.subscribe(
            &EventType::ALL,
            move |event, _bus| {
                let keys = query_keys(event.event_type, &event.payload);
                if let Some(callback) = &callback {
                    callback(keys);
                }
                Ok(())
            },
            SubscribeOptions {
                priority: CACHE_INVALIDATION_PRIORITY,
                ..SubscribeOptions::labeled(CACHE_INVALIDATION_LABEL)
            },
        );
        *lock(&self.cache_subscription) = Some(id);
    }

    // ---- events ----

    /// Subscribes a handler on the underlying bus.
    pub fn subscribe<F>(&self, event_types: &[EventType], handler: F, options: SubscribeOptions) -> Uuid
    where
        F: Fn(&CoordinationEvent, &EventBus) -> Result<(), CoordinationError> + Send + Sync + 'static,
    {
        self.bus.subscribe(event_types, handler, options)
    }

    pub fn unsubscribe(&self, subscription_id: Uuid) -> bool {
        self.bus.unsubscribe(subscription_id)
    }

    /// Emits a forward event.
    ///
    /// Once the bus accepts the event it clears the redo stack, is logged
    /// and, unless `options.undoable` is false, is pushed on the undo stack
    /// before any handler runs. A suppressed duplicate leaves history alone.
    #[instrument(skip(self, payload, options), fields(entity_id = %payload.entity_id))]
    pub fn emit(&self, event_type: EventType, payload: BaseEventPayload, options: HubEmitOptions) -> Uuid {
        let journal = Arc::clone(&self.journal);
        let clock = Arc::clone(&self.clock);
        let HubEmitOptions {
            emit,
            undoable,
            undo_data,
        } = options;
        let hook: AcceptHook = Box::new(move |event: &CoordinationEvent| {
            let mut journal = lock(&journal);
            journal.history.clear_redo();
            journal
                .activity
                .record(ActivityEntry::for_event(ActivityKind::Emit, event, clock.now()));
            if undoable {
                journal.history.push_undo(EventHistoryEntry {
                    event: event.clone(),
                    undo_data,
                });
            }
        });

        self.bus.emit_with_hook(event_type, payload, emit, Some(hook))
    }

    /// Emits `entries` inside one bus batch and returns the batch id.
    pub fn emit_batch(&self, entries: Vec<HubBatchEntry>) -> Uuid {
        let batch_id = self.bus.start_batch(None);
        for entry in entries {
            self.emit(entry.event_type, entry.payload, entry.options);
        }
        self.bus.end_batch();
        batch_id
    }

    /// Fires due debounce timers and batch windows.
    pub fn fire_due_timers(&self) -> usize {
        self.bus.fire_due_timers()
    }

    /// Drains any queued events.
    pub fn flush(&self) {
        self.bus.flush();
    }

    // ---- graph ----

    pub fn register_dependency(
        &self,
        source: EntityReference,
        target: EntityReference,
        dependency_type: DependencyType,
        options: DependencyOptions,
    ) -> Uuid {
        self.graph()
            .add_dependency(source, target, dependency_type, options)
    }

    /// Adds rule-derived edges from `entity` to each related entity.
    pub fn register_entity_dependencies(
        &self,
        entity: &EntityReference,
        related: &[EntityReference],
    ) -> Vec<Uuid> {
        self.graph().register_entity_dependencies(entity, related)
    }

    pub fn remove_dependency(&self, dependency_id: Uuid) -> bool {
        self.graph().remove_dependency(dependency_id)
    }

    pub fn remove_entity_dependencies(&self, entity: &EntityReference) -> usize {
        self.graph().remove_entity_dependencies(entity)
    }

    #[must_use]
    pub fn get_dependencies(&self, entity: &EntityReference) -> Vec<Dependency> {
        self.graph()
            .get_dependencies(entity)
            .into_iter()
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get_dependents(&self, entity: &EntityReference) -> Vec<Dependency> {
        self.graph()
            .get_dependents(entity)
            .into_iter()
            .cloned()
            .collect()
    }

    /// What a change to `entity` would affect. Does not touch the bus.
    #[must_use]
    pub fn preview_impact(&self, entity: &EntityReference, event_type: EventType) -> ImpactAnalysis {
        self.graph().analyze_impact(entity, event_type)
    }

    #[must_use]
    pub fn get_delete_impact(&self, entity: &EntityReference) -> Vec<EntityReference> {
        self.graph().get_delete_impact(entity)
    }

    #[must_use]
    pub fn export_graph(&self) -> GraphExport {
        self.graph().export_for_visualization()
    }

    #[must_use]
    pub fn get_subgraph(&self, entity: &EntityReference, max_depth: usize) -> GraphExport {
        self.graph().get_subgraph(entity, max_depth)
    }

    // ---- staging ----

    /// Computes the impact of a change now and holds it until executed.
    pub fn stage_change(
        &self,
        entity: EntityReference,
        event_type: EventType,
        payload: BaseEventPayload,
        options: HubEmitOptions,
    ) -> PendingChange {
        let now = self.clock.now();
        let change = PendingChange {
            id: Uuid::new_v4(),
            impact: self.preview_impact(&entity, event_type),
            entity,
            event_type,
            payload,
            options,
            created_at: now,
        };
        debug!(change_id = %change.id, affected = change.impact.total_affected, "change staged");
        self.journal().activity.record(ActivityEntry {
            timestamp: now,
            kind: ActivityKind::Stage,
            event_type: Some(event_type),
            description: format!("staged {event_type} for {}", change.entity),
            entity_id: Some(change.entity.id.clone()),
            entity_type: Some(change.entity.entity_type),
        });
        lock(&self.staging).stage(change.clone());
        change
    }

    /// Emits a staged change and returns the event id.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::ChangeNotFound` if no pending change has
    /// this id.
    pub fn execute_change(&self, change_id: Uuid) -> Result<Uuid, CoordinationError> {
        let change = lock(&self.staging)
            .take(change_id)
            .ok_or(CoordinationError::ChangeNotFound(change_id))?;
        Ok(self.execute(change))
    }

    /// Emits every staged change in staging order.
    pub fn execute_all_changes(&self) -> Vec<Uuid> {
        let changes = lock(&self.staging).take_all();
        changes.into_iter().map(|c| self.execute(c)).collect()
    }

    fn execute(&self, change: PendingChange) -> Uuid {
        self.journal().activity.record(ActivityEntry::note(
            ActivityKind::Execute,
            format!("executed staged {} for {}", change.event_type, change.entity),
            self.clock.now(),
        ));
        self.emit(change.event_type, change.payload, change.options)
    }

    /// Drops a staged change. Returns `false` if the id is unknown.
    pub fn cancel_change(&self, change_id: Uuid) -> bool {
        let Some(change) = lock(&self.staging).take(change_id) else {
            return false;
        };
        self.journal().activity.record(ActivityEntry::note(
            ActivityKind::Cancel,
            format!("cancelled staged {} for {}", change.event_type, change.entity),
            self.clock.now(),
        ));
        true
    }

    #[must_use]
    pub fn get_pending_changes(&self) -> Vec<PendingChange> {
        lock(&self.staging).snapshot()
    }

    // ---- undo / redo ----

    /// Moves the newest undo entry to the redo stack and emits its reverse.
    ///
    /// Returns `false` when there is nothing to undo. When no reverse can be
    /// derived the entry still moves and nothing is emitted.
    #[instrument(skip(self))]
    pub fn undo(&self) -> bool {
        let now = self.clock.now();
        let entry = {
            let mut journal = self.journal();
            let Some(entry) = journal.history.pop_undo() else {
                return false;
            };
            journal.history.push_redo(entry.clone());
            journal.history.mark_undone(now);
            journal
                .activity
                .record(ActivityEntry::for_event(ActivityKind::Undo, &entry.event, now));
            entry
        };

        match entry.reverse() {
            Some((event_type, payload)) => {
                info!(original = %entry.event.event_type, reverse = %event_type, "undoing event");
                self.bus.emit(
                    event_type,
                    payload.with_source(EventSource::Undo),
                    replay_options(&entry),
                );
            }
            None => warn!(
                event_id = %entry.event.id,
                event_type = %entry.event.event_type,
                "no reverse available; undo recorded without emitting"
            ),
        }
        true
    }

    /// Moves the newest redo entry back to the undo stack and re-emits the
    /// original event.
    #[instrument(skip(self))]
    pub fn redo(&self) -> bool {
        let entry = {
            let mut journal = self.journal();
            let Some(entry) = journal.history.pop_redo() else {
                return false;
            };
            journal.history.push_undo(entry.clone());
            let now = self.clock.now();
            journal
                .activity
                .record(ActivityEntry::for_event(ActivityKind::Redo, &entry.event, now));
            entry
        };

        info!(event_type = %entry.event.event_type, "redoing event");
        let payload = BaseEventPayload::from(entry.event.payload.clone()).with_source(EventSource::Redo);
        self.bus
            .emit(entry.event.event_type, payload, replay_options(&entry));
        true
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.journal().history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.journal().history.can_redo()
    }

    #[must_use]
    pub fn get_undo_context(&self) -> UndoContext {
        self.journal().history.context()
    }

    // ---- activity ----

    #[must_use]
    pub fn get_activity_log(&self) -> Vec<ActivityEntry> {
        self.journal().activity.entries()
    }

    pub fn clear_activity_log(&self) {
        self.journal().activity.clear();
    }

    // ---- persistence ----

    fn persistence_store(&self) -> Option<&Arc<dyn StateStore>> {
        if !self.config.enable_persistence {
            return None;
        }
        if self.store.is_none() {
            debug!("persistence enabled without a state store");
        }
        self.store.as_ref()
    }

    fn snapshot(&self) -> PersistedState {
        let (undo_context, activity_log) = {
            let journal = self.journal();
            (
                journal.history.context(),
                journal.activity.newest(self.config.persisted_activity_size),
            )
        };
        let dependencies = self.graph().dependencies().into_iter().cloned().collect();
        PersistedState::trimmed(
            undo_context,
            dependencies,
            activity_log,
            self.config.persisted_history_size,
            self.clock.now(),
        )
    }

    /// Writes undo history, dependencies and the activity log to the state
    /// store. Failures are logged, never returned.
    #[instrument(skip(self))]
    pub async fn save_state(&self) {
        let Some(store) = self.persistence_store() else {
            return;
        };
        let state = match self.snapshot().to_value() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "failed to encode coordination state");
                return;
            }
        };
        match store.save(&self.config.persistence_key, &state).await {
            Ok(()) => debug!(key = %self.config.persistence_key, "coordination state saved"),
            Err(e) => warn!(error = %e, "failed to save coordination state"),
        }
    }

    /// Restores state written by [`save_state`](Self::save_state).
    ///
    /// Returns whether anything was restored. Failures are logged and leave
    /// the in-memory state untouched.
    #[instrument(skip(self))]
    pub async fn load_state(&self) -> bool {
        let Some(store) = self.persistence_store() else {
            return false;
        };
        let value = match store.load(&self.config.persistence_key).await {
            Ok(Some(value)) => value,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "failed to load coordination state");
                return false;
            }
        };
        let state = match PersistedState::from_value(value) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "stored coordination state is unreadable");
                return false;
            }
        };

        let dependency_count = state.dependencies.len();
        self.graph().restore(state.dependencies);
        let mut journal = self.journal();
        journal.history.restore(state.undo_context);
        journal.activity.clear();
        for entry in state.activity_log {
            journal.activity.record(entry);
        }
        info!(dependencies = dependency_count, saved_at = %state.saved_at, "coordination state restored");
        true
    }

    // ---- lifecycle ----

    /// Clears all state, re-creates the cache-invalidation subscription and
    /// removes any persisted state. The hub stays usable.
    #[instrument(skip(self))]
    pub async fn reset(&self) {
        self.bus.flush();
        self.bus.reset();
        self.graph().clear();
        lock(&self.staging).clear();
        {
            let mut journal = self.journal();
            journal.history.clear();
            journal.activity.clear();
            journal.activity.record(ActivityEntry::note(
                ActivityKind::Reset,
                "coordination state reset",
                self.clock.now(),
            ));
        }
        self.subscribe_cache_invalidation();

        if let Some(store) = self.persistence_store() {
            if let Err(e) = store.remove(&self.config.persistence_key).await {
                warn!(error = %e, "failed to remove persisted coordination state");
            }
        }
        info!("coordination hub reset");
    }

    /// Cancels timers and drops every subscription, including the
    /// cache-invalidation handler.
    pub fn destroy(&self) {
        self.bus.destroy();
        *lock(&self.cache_subscription) = None;
        lock(&self.staging).clear();
    }
}

fn replay_options(entry: &EventHistoryEntry) -> EmitOptions {
    EmitOptions {
        priority: entry.event.metadata.priority,
        bypass_dedup: true,
        ..EmitOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use storyweave_core::entity::EntityType;
    use storyweave_core::payload::EntityDetails;
    use storyweave_test_support::{EventRecorder, FixedClock, fixed_now};

    use super::*;

    fn hub() -> CoordinationHub {
        CoordinationHub::builder(CoordinationConfig::default())
            .clock(Arc::new(FixedClock(fixed_now())))
            .build()
    }

    fn record_all(hub: &CoordinationHub) -> EventRecorder {
        let recorder = EventRecorder::new();
        let sink = recorder.clone();
        hub.subscribe(
            &EventType::ALL,
            move |event, _| {
                sink.record(event);
                Ok(())
            },
            SubscribeOptions::labeled("recorder"),
        );
        recorder
    }

    fn character(id: &str) -> BaseEventPayload {
        BaseEventPayload::new(id, "p1", EntityDetails::empty(EntityType::Character))
    }

    #[test]
    fn test_emit_pushes_history_and_logs_activity() {
        // Arrange
        let hub = hub();

        // Act
        hub.emit(EventType::CharacterCreated, character("c1"), HubEmitOptions::default());

        // Assert
        let context = hub.get_undo_context();
        assert!(context.can_undo);
        assert_eq!(context.undo_stack[0].event.payload.entity_id, "c1");
        let log = hub.get_activity_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, ActivityKind::Emit);
        assert_eq!(log[0].entity_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_not_undoable_emission_skips_history() {
        let hub = hub();

        hub.emit(EventType::CharacterCreated, character("c1"), HubEmitOptions::not_undoable());

        assert!(!hub.can_undo());
        assert_eq!(hub.get_activity_log().len(), 1);
    }

    #[test]
    fn test_history_is_pushed_before_handlers_run() {
        // Arrange
        let hub = hub();
        let journal = Arc::clone(&hub.journal);
        let seen_depth = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen_depth);
        hub.subscribe(
            &[EventType::SceneCreated],
            move |_, _| {
                *sink.lock().unwrap() = Some(lock(&journal).history.context().undo_stack.len());
                Ok(())
            },
            SubscribeOptions::default(),
        );

        // Act
        hub.emit(
            EventType::SceneCreated,
            BaseEventPayload::new("s1", "p1", EntityDetails::empty(EntityType::Scene)),
            HubEmitOptions::default(),
        );

        // Assert
        assert_eq!(*seen_depth.lock().unwrap(), Some(1));
    }

    #[test]
    fn test_undo_update_without_reverse_still_moves_entry() {
        // Arrange
        let hub = hub();
        let recorder = record_all(&hub);
        hub.emit(
            EventType::CharacterUpdated,
            character("c1").with_change("mood", None, json!("grim")),
            HubEmitOptions::default(),
        );

        // Act
        let undone = hub.undo();

        // Assert
        assert!(undone);
        assert!(!hub.can_undo());
        assert!(hub.can_redo());
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_undo_on_empty_stack_returns_false() {
        let hub = hub();

        assert!(!hub.undo());
        assert!(!hub.redo());
    }

    #[test]
    fn test_undo_records_timestamp() {
        let hub = hub();
        hub.emit(EventType::ActCreated, BaseEventPayload::new("a1", "p1", EntityDetails::empty(EntityType::Act)), HubEmitOptions::default());

        hub.undo();

        assert_eq!(hub.get_undo_context().last_undo_timestamp, Some(fixed_now()));
    }

    #[test]
    fn test_execute_unknown_change_is_an_error() {
        let hub = hub();

        let result = hub.execute_change(Uuid::new_v4());

        assert!(matches!(result, Err(CoordinationError::ChangeNotFound(_))));
    }

    #[test]
    fn test_cancel_change_removes_it_without_emitting() {
        // Arrange
        let hub = hub();
        let recorder = record_all(&hub);
        let entity = EntityReference::new(EntityType::Character, "c1").with_project("p1");
        let change = hub.stage_change(
            entity.clone(),
            EventType::CharacterDeleted,
            BaseEventPayload::for_entity(&entity),
            HubEmitOptions::default(),
        );

        // Act
        let cancelled = hub.cancel_change(change.id);

        // Assert
        assert!(cancelled);
        assert!(!hub.cancel_change(change.id));
        assert!(hub.get_pending_changes().is_empty());
        assert!(recorder.is_empty());
        let kinds: Vec<ActivityKind> = hub.get_activity_log().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ActivityKind::Stage, ActivityKind::Cancel]);
    }

    #[test]
    fn test_destroy_drops_cache_subscription() {
        let hub = hub();
        assert!(hub.cache_subscription().is_some());
        assert_eq!(hub.event_bus().subscription_count(), 1);

        hub.destroy();

        assert!(hub.cache_subscription().is_none());
        assert_eq!(hub.event_bus().subscription_count(), 0);
    }
}
