//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint storage backends
//! and associated error types.

use crate::checkpoint::Checkpoint;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint storage backend implementations
///
/// A checkpoint is keyed by the (site, board) pair. Implementations should
/// preserve `created_at` when an existing checkpoint is updated.
pub trait CheckpointStore {
    /// Inserts a checkpoint, or updates the existing row for its (site, board)
    ///
    /// On update every field except `created_at` is replaced.
    fn upsert_checkpoint(&mut self, checkpoint: &Checkpoint) -> StorageResult<()>;

    /// Gets the checkpoint for a (site, board) pair, if one exists
    fn get_checkpoint(&self, site: &str, board: &str) -> StorageResult<Option<Checkpoint>>;

    /// Answers whether a checkpoint is stored for a (site, board) pair
    fn exists(&self, site: &str, board: &str) -> StorageResult<bool>;

    /// Deletes the checkpoint for a (site, board) pair
    ///
    /// # Returns
    ///
    /// `true` when a row was deleted, `false` when none existed
    fn delete_checkpoint(&mut self, site: &str, board: &str) -> StorageResult<bool>;

    /// Lists all stored checkpoints
    fn list_checkpoints(&self) -> StorageResult<Vec<Checkpoint>>;
}
