//! Content-hash duplicate suppression.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use storyweave_core::event::EventType;
use storyweave_core::payload::BaseEventPayload;

/// Hashes `type + entityId + projectId + JSON(payload)`.
pub(crate) fn content_hash(event_type: EventType, payload: &BaseEventPayload) -> String {
    // Derived Serialize over string keys cannot fail.
    let body = serde_json::to_string(payload).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(event_type.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(payload.entity_id.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(payload.project_id.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hashes seen within the expiry window.
#[derive(Debug, Default)]
pub(crate) struct RecentHashes {
    seen: HashMap<String, DateTime<Utc>>,
}

impl RecentHashes {
    /// Returns `true` if `hash` was recorded less than `ttl` ago; otherwise
    /// records it and returns `false`. Expired entries are purged first.
    pub(crate) fn check_and_record(&mut self, hash: String, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        self.seen.retain(|_, seen_at| now - *seen_at < ttl);
        if self.seen.contains_key(&hash) {
            return true;
        }
        self.seen.insert(hash, now);
        false
    }

    pub(crate) fn clear(&mut self) {
        self.seen.clear();
    }
}
