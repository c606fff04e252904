//! Storyweave coordination runner entry point.
//!
//! Builds a hub from layered configuration, restores any persisted state,
//! runs a short story-editing session through it, and saves the result.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use storyweave_core::config::CoordinationConfig;
use storyweave_core::store::StateStore;
use storyweave_event_bus::{BatchSummary, spawn_timer_driver};
use storyweave_hub::CoordinationHub;
use storyweave_state_store::{MemoryStateStore, PgStateStore};
use tracing_subscriber::EnvFilter;

mod walkthrough;

const TIMER_PERIOD: Duration = Duration::from_millis(25);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Storyweave coordination runner");

    // Read configuration: optional YAML document, then STORYWEAVE_* overrides.
    let yaml = match std::env::var("STORYWEAVE_CONFIG") {
        Ok(path) => Some(
            std::fs::read_to_string(&path)
                .map_err(|e| format!("cannot read STORYWEAVE_CONFIG file {path}: {e}"))?,
        ),
        Err(_) => None,
    };
    let config = CoordinationConfig::from_env(yaml.as_deref())?;

    // Pick the state store.
    let store: Arc<dyn StateStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await?;
            let store = PgStateStore::new(pool);
            store.ensure_schema().await?;
            tracing::info!("Using PostgreSQL state store");
            Arc::new(store)
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set; using in-memory state store");
            Arc::new(MemoryStateStore::new())
        }
    };

    // Build the hub.
    let hub = CoordinationHub::builder(config)
        .state_store(store)
        .on_cache_invalidation(|keys| {
            tracing::debug!(keys = ?keys, "query keys invalidated");
        })
        .on_batch_complete(Arc::new(|summary: &BatchSummary| {
            tracing::info!(batch_id = %summary.batch_id, events = summary.event_ids.len(), "batch settled");
        }))
        .build();
    let driver = spawn_timer_driver(Arc::clone(hub.event_bus()), TIMER_PERIOD);

    if hub.load_state().await {
        tracing::info!("Restored previous coordination state");
    }

    walkthrough::run(&hub).await;

    hub.save_state().await;
    hub.destroy();
    driver.abort();

    tracing::info!("Storyweave coordination runner finished");
    Ok(())
}
