//! Storage module for persisting crawl checkpoints
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Checkpoint persistence keyed by (site, board)
//! - An in-memory backend for tests and dry runs

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CheckpointStore, StorageError, StorageResult};

use crate::checkpoint::Checkpoint;
use std::collections::HashMap;
use std::path::Path;

/// Initializes or opens a checkpoint database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::new(path)
}

/// In-memory checkpoint store
///
/// Backs dry runs and unit tests; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    checkpoints: HashMap<(String, String), Checkpoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryStore {
    fn upsert_checkpoint(&mut self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let key = (checkpoint.site.clone(), checkpoint.board.clone());
        let mut stored = checkpoint.clone();
        if let Some(existing) = self.checkpoints.get(&key) {
            stored.created_at = existing.created_at.clone();
        }
        self.checkpoints.insert(key, stored);
        Ok(())
    }

    fn get_checkpoint(&self, site: &str, board: &str) -> StorageResult<Option<Checkpoint>> {
        Ok(self
            .checkpoints
            .get(&(site.to_string(), board.to_string()))
            .cloned())
    }

    fn exists(&self, site: &str, board: &str) -> StorageResult<bool> {
        Ok(self
            .checkpoints
            .contains_key(&(site.to_string(), board.to_string())))
    }

    fn delete_checkpoint(&mut self, site: &str, board: &str) -> StorageResult<bool> {
        Ok(self
            .checkpoints
            .remove(&(site.to_string(), board.to_string()))
            .is_some())
    }

    fn list_checkpoints(&self) -> StorageResult<Vec<Checkpoint>> {
        let mut all: Vec<Checkpoint> = self.checkpoints.values().cloned().collect();
        all.sort_by(|a, b| (&a.site, &a.board).cmp(&(&b.site, &b.board)));
        Ok(all)
    }
}
