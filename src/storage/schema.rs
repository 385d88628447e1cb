//! Database schema definitions
//!
//! This module contains the SQL schema for the boardwalk checkpoint database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One checkpoint per (site, board) pair
CREATE TABLE IF NOT EXISTS checkpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site TEXT NOT NULL,
    board TEXT NOT NULL,
    status TEXT NOT NULL,
    current_page INTEGER NOT NULL DEFAULT 1,
    last_item_id TEXT,
    min_item_id INTEGER,
    max_item_id INTEGER,
    seen_ids TEXT NOT NULL DEFAULT '[]',
    stats TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(site, board)
);

CREATE INDEX IF NOT EXISTS idx_checkpoints_site ON checkpoints(site);
CREATE INDEX IF NOT EXISTS idx_checkpoints_status ON checkpoints(status);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Gets the current schema version
///
/// This can be used for future migrations if the schema changes.
pub fn get_schema_version() -> u32 {
    1
}
