//! A short scripted editing session that exercises the hub end to end.

use std::time::Duration;

use serde_json::json;
use storyweave_core::entity::{EntityReference, EntityType};
use storyweave_core::event::EventType;
use storyweave_core::payload::{BaseEventPayload, EntityDetails};
use storyweave_event_bus::{EmitOptions, SubscribeOptions};
use storyweave_graph::{DependencyOptions, DependencyType};
use storyweave_hub::{CoordinationHub, HubBatchEntry, HubEmitOptions};
use tracing::info;

const PROJECT: &str = "lighthouse";

pub(crate) async fn run(hub: &CoordinationHub) {
    let project = EntityReference::new(EntityType::Project, PROJECT).with_name("The Lighthouse");
    let act = EntityReference::new(EntityType::Act, "act-1").with_project(PROJECT);
    let scene = EntityReference::new(EntityType::Scene, "scene-storm").with_project(PROJECT);
    let keeper = EntityReference::new(EntityType::Character, "keeper")
        .with_name("The Keeper")
        .with_project(PROJECT);
    let arrival = EntityReference::new(EntityType::Beat, "beat-arrival").with_project(PROJECT);
    let reveal = EntityReference::new(EntityType::Beat, "beat-reveal").with_project(PROJECT);

    hub.subscribe(
        &[EventType::CharacterDeleted],
        |event, _bus| {
            info!(entity_id = %event.payload.entity_id, source = ?event.payload.source, "character removed from story");
            Ok(())
        },
        SubscribeOptions::labeled("walkthrough-observer"),
    );

    // Structure.
    hub.register_entity_dependencies(&act, std::slice::from_ref(&project));
    hub.register_entity_dependencies(&scene, &[project.clone(), act.clone(), keeper.clone()]);
    hub.register_entity_dependencies(&arrival, &[act.clone(), scene.clone()]);
    hub.register_dependency(
        reveal.clone(),
        arrival.clone(),
        DependencyType::Requires,
        DependencyOptions::default(),
    );

    hub.emit_batch(
        [&act, &scene, &keeper]
            .into_iter()
            .map(|entity| HubBatchEntry {
                event_type: created(entity.entity_type),
                payload: BaseEventPayload::for_entity(entity),
                options: HubEmitOptions::default(),
            })
            .collect(),
    );

    // Rapid title edits coalesce into one event.
    for title in ["Storm", "Storm at", "Storm at Sea"] {
        hub.emit(
            EventType::SceneUpdated,
            BaseEventPayload::new(
                scene.id.clone(),
                PROJECT,
                EntityDetails::Scene {
                    act_id: Some(act.id.clone()),
                    character_ids: vec![keeper.id.clone()],
                },
            )
            .with_change("title", Some(json!("Untitled")), json!(title)),
            HubEmitOptions {
                emit: EmitOptions::debounced(format!("scene-title:{}", scene.id)),
                ..HubEmitOptions::default()
            },
        );
    }
    let quiet = hub.config().debounce_ms.saturating_mul(3);
    tokio::time::sleep(Duration::from_millis(quiet)).await;

    // Preview, then confirm, a destructive change.
    let impact = hub.preview_impact(&keeper, EventType::CharacterDeleted);
    info!(affected = impact.total_affected, "deleting the keeper would affect entities");
    let doomed = hub.get_delete_impact(&arrival);
    info!(cascade = doomed.len(), "deleting the arrival beat cascades");

    let change = hub.stage_change(
        keeper.clone(),
        EventType::CharacterDeleted,
        BaseEventPayload::for_entity(&keeper),
        HubEmitOptions::default(),
    );
    if let Err(e) = hub.execute_change(change.id) {
        tracing::warn!(error = %e, "staged change vanished");
    }

    // Walk the history back and forth.
    hub.undo();
    hub.undo();
    hub.redo();
    let context = hub.get_undo_context();
    info!(
        undo_depth = context.undo_stack.len(),
        redo_depth = context.redo_stack.len(),
        "history after undo/redo"
    );

    let graph = hub.export_graph();
    info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "dependency graph");
    info!(entries = hub.get_activity_log().len(), "activity log");
}

fn created(entity_type: EntityType) -> EventType {
    match entity_type {
        EntityType::Character => EventType::CharacterCreated,
        EntityType::Scene => EventType::SceneCreated,
        EntityType::Act => EventType::ActCreated,
        EntityType::Beat => EventType::BeatCreated,
        EntityType::Faction => EventType::FactionCreated,
        EntityType::Asset => EventType::AssetCreated,
        EntityType::Relationship => EventType::RelationshipCreated,
        EntityType::Project => EventType::ProjectCreated,
    }
}
