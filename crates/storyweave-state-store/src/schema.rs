//! State store database schema.

/// SQL to create the coordination state table.
pub const CREATE_COORDINATION_STATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS coordination_state (
    state_key  TEXT PRIMARY KEY,
    payload    JSONB NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";
