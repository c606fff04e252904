//! Query-key mapping for cache invalidation.
//!
//! Every event maps to the cache keys an external query layer should drop:
//! the list key `[<plural>, project_id]`, the entity key
//! `[<singular>, entity_id]`, and keys for parents named in the payload's
//! type-specific fields.

use std::sync::Arc;

use storyweave_core::event::EventType;
use storyweave_core::payload::{EntityDetails, EventPayload};

/// Receives the query keys invalidated by one event.
pub type CacheInvalidationCallback = Arc<dyn Fn(Vec<Vec<String>>) + Send + Sync>;

fn key(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_owned()).collect()
}

/// Cache keys invalidated by `event_type` carrying `payload`.
#[must_use]
pub fn query_keys(event_type: EventType, payload: &EventPayload) -> Vec<Vec<String>> {
    let project = payload.project_id.as_str();
    let id = payload.entity_id.as_str();
    let mut keys = Vec::new();

    match &payload.details {
        EntityDetails::Character { faction_id } => {
            keys.push(key(&["characters", project]));
            keys.push(key(&["character", id]));
            if let Some(faction_id) = faction_id {
                keys.push(key(&["faction", faction_id]));
            }
            if event_type == EventType::CharacterAppearanceChanged {
                keys.push(key(&["character", id, "appearance"]));
            }
            if event_type.is_delete() {
                keys.push(key(&["relationships", project]));
            }
        }
        EntityDetails::Scene {
            act_id,
            character_ids,
        } => {
            keys.push(key(&["scenes", project]));
            keys.push(key(&["scene", id]));
            if let Some(act_id) = act_id {
                keys.push(key(&["act", act_id]));
                keys.push(key(&["scenes", project, act_id]));
            }
            for character_id in character_ids {
                keys.push(key(&["character", character_id]));
            }
        }
        EntityDetails::Act { .. } => {
            keys.push(key(&["acts", project]));
            keys.push(key(&["act", id]));
        }
        EntityDetails::Beat {
            act_id,
            scene_id,
            related_beat_id,
        } => {
            keys.push(key(&["beats", project]));
            keys.push(key(&["beat", id]));
            if let Some(act_id) = act_id {
                keys.push(key(&["act", act_id]));
            }
            if let Some(scene_id) = scene_id {
                keys.push(key(&["scene", scene_id]));
            }
            if let Some(related_beat_id) = related_beat_id {
                keys.push(key(&["beat", related_beat_id]));
            }
        }
        EntityDetails::Faction { member_id } => {
            keys.push(key(&["factions", project]));
            keys.push(key(&["faction", id]));
            if let Some(member_id) = member_id {
                keys.push(key(&["faction", id, "members"]));
                keys.push(key(&["character", member_id]));
            }
        }
        EntityDetails::Asset { .. } => {
            keys.push(key(&["assets", project]));
            keys.push(key(&["asset", id]));
        }
        EntityDetails::Relationship {
            source_character_id,
            target_character_id,
        } => {
            keys.push(key(&["relationships", project]));
            keys.push(key(&["relationship", id]));
            for character_id in [source_character_id, target_character_id].into_iter().flatten() {
                keys.push(key(&["character", character_id]));
            }
        }
        EntityDetails::Project {} => {
            keys.push(key(&["projects"]));
            keys.push(key(&["project", id]));
        }
    }

    keys
}
