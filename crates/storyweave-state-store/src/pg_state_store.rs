//! `PostgreSQL` implementation of the `StateStore` trait.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use storyweave_core::error::CoordinationError;
use storyweave_core::store::StateStore;

use crate::schema::CREATE_COORDINATION_STATE_TABLE;

/// PostgreSQL-backed state store. One row per key in `coordination_state`.
#[derive(Debug, Clone)]
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    /// Creates a new `PgStateStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the state table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CoordinationError::Persistence` if the statement fails.
    pub async fn ensure_schema(&self) -> Result<(), CoordinationError> {
        sqlx::raw_sql(CREATE_COORDINATION_STATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| CoordinationError::Persistence(format!("schema creation failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn save(&self, key: &str, state: &serde_json::Value) -> Result<(), CoordinationError> {
        sqlx::query(
            "INSERT INTO coordination_state (state_key, payload, updated_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (state_key) DO UPDATE \
             SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at",
        )
        .bind(key)
        .bind(state)
        .execute(&self.pool)
        .await
        .map_err(|e| CoordinationError::Persistence(format!("state save failed: {e}")))?;
        debug!(key, "coordination state row upserted");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>, CoordinationError> {
        sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT payload FROM coordination_state WHERE state_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoordinationError::Persistence(format!("state load failed: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<(), CoordinationError> {
        sqlx::query("DELETE FROM coordination_state WHERE state_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| CoordinationError::Persistence(format!("state removal failed: {e}")))?;
        Ok(())
    }
}
