//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CheckpointStore
//! trait. Seen-id sets and stats counters live in JSON columns; everything
//! queried on lives in its own column.

use crate::checkpoint::{Checkpoint, CheckpointStats, CheckpointStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;

/// SQLite checkpoint storage backend
pub struct SqliteStore {
    conn: Connection,
}

/// Raw checkpoint row before the JSON columns are decoded
struct CheckpointRow {
    site: String,
    board: String,
    status: String,
    current_page: u32,
    last_item_id: Option<String>,
    min_item_id: Option<i64>,
    max_item_id: Option<i64>,
    seen_ids: String,
    stats: String,
    created_at: String,
    updated_at: String,
}

const CHECKPOINT_COLUMNS: &str = "site, board, status, current_page, last_item_id, \
     min_item_id, max_item_id, seen_ids, stats, created_at, updated_at";

impl SqliteStore {
    /// Creates a new SqliteStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn row_to_checkpoint(row: CheckpointRow) -> StorageResult<Checkpoint> {
        let seen_ids: HashSet<String> = serde_json::from_str(&row.seen_ids)?;
        let stats: CheckpointStats = serde_json::from_str(&row.stats)?;
        let status = CheckpointStatus::from_db_string(&row.status).ok_or_else(|| {
            StorageError::Database(format!("unknown checkpoint status '{}'", row.status))
        })?;

        Ok(Checkpoint {
            site: row.site,
            board: row.board,
            status,
            current_page: row.current_page,
            last_item_id: row.last_item_id,
            min_item_id: row.min_item_id.map(|v| v as u64),
            max_item_id: row.max_item_id.map(|v| v as u64),
            seen_ids,
            stats,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CheckpointRow> {
        Ok(CheckpointRow {
            site: row.get(0)?,
            board: row.get(1)?,
            status: row.get(2)?,
            current_page: row.get(3)?,
            last_item_id: row.get(4)?,
            min_item_id: row.get(5)?,
            max_item_id: row.get(6)?,
            seen_ids: row.get(7)?,
            stats: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl CheckpointStore for SqliteStore {
    fn upsert_checkpoint(&mut self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let seen_ids = serde_json::to_string(&checkpoint.seen_ids)?;
        let stats = serde_json::to_string(&checkpoint.stats)?;

        self.conn.execute(
            "INSERT INTO checkpoints (site, board, status, current_page, last_item_id, \
                 min_item_id, max_item_id, seen_ids, stats, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(site, board) DO UPDATE SET \
                 status = excluded.status, \
                 current_page = excluded.current_page, \
                 last_item_id = excluded.last_item_id, \
                 min_item_id = excluded.min_item_id, \
                 max_item_id = excluded.max_item_id, \
                 seen_ids = excluded.seen_ids, \
                 stats = excluded.stats, \
                 updated_at = excluded.updated_at",
            params![
                checkpoint.site,
                checkpoint.board,
                checkpoint.status.to_db_string(),
                checkpoint.current_page,
                checkpoint.last_item_id,
                checkpoint.min_item_id.map(|v| v as i64),
                checkpoint.max_item_id.map(|v| v as i64),
                seen_ids,
                stats,
                checkpoint.created_at,
                checkpoint.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_checkpoint(&self, site: &str, board: &str) -> StorageResult<Option<Checkpoint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM checkpoints WHERE site = ?1 AND board = ?2",
            CHECKPOINT_COLUMNS
        ))?;

        let row = stmt
            .query_row(params![site, board], Self::read_row)
            .optional()?;

        row.map(Self::row_to_checkpoint).transpose()
    }

    fn exists(&self, site: &str, board: &str) -> StorageResult<bool> {
        let found = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM checkpoints WHERE site = ?1 AND board = ?2)",
            params![site, board],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn delete_checkpoint(&mut self, site: &str, board: &str) -> StorageResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM checkpoints WHERE site = ?1 AND board = ?2",
            params![site, board],
        )?;
        Ok(deleted > 0)
    }

    fn list_checkpoints(&self) -> StorageResult<Vec<Checkpoint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM checkpoints ORDER BY site, board",
            CHECKPOINT_COLUMNS
        ))?;

        let rows = stmt.query_map([], Self::read_row)?;

        let mut checkpoints = Vec::new();
        for row in rows {
            checkpoints.push(Self::row_to_checkpoint(row?)?);
        }
        Ok(checkpoints)
    }
}
