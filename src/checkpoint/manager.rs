use chrono::Utc;
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStatus};
use crate::storage::CheckpointStore;

/// Save/load facade over a checkpoint storage backend
///
/// Persistence here is best effort: a crawl should not die because a
/// checkpoint write failed. Mutating operations return `bool` instead of an
/// error, logging the failure and reporting `false`.
pub struct CheckpointManager<S: CheckpointStore> {
    store: S,
}

impl<S: CheckpointStore> CheckpointManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads the checkpoint for a (site, board) pair
    ///
    /// Returns `None` both when no checkpoint exists and when the load fails;
    /// a failed load is logged and treated as a cold start.
    pub fn load(&self, site: &str, board: &str) -> Option<Checkpoint> {
        match self.store.get_checkpoint(site, board) {
            Ok(found) => found,
            Err(e) => {
                warn!(site, board, error = %e, "failed to load checkpoint");
                None
            }
        }
    }

    /// Loads the checkpoint for a (site, board) pair, or creates a fresh one
    pub fn load_or_create(&self, site: &str, board: &str) -> Checkpoint {
        match self.load(site, board) {
            Some(cp) => {
                debug!(
                    site,
                    board,
                    page = cp.current_page,
                    seen = cp.seen_ids.len(),
                    "loaded existing checkpoint"
                );
                cp
            }
            None => Checkpoint::new(site, board),
        }
    }

    /// Persists a checkpoint, stamping its `updated_at`
    ///
    /// # Returns
    ///
    /// `true` on success, `false` on a storage error (logged, never raised)
    pub fn save(&mut self, checkpoint: &mut Checkpoint) -> bool {
        checkpoint.updated_at = Utc::now().to_rfc3339();
        match self.store.upsert_checkpoint(checkpoint) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    site = %checkpoint.site,
                    board = %checkpoint.board,
                    error = %e,
                    "failed to save checkpoint"
                );
                false
            }
        }
    }

    /// Marks the (site, board) crawl as completed
    ///
    /// Idempotent: marking an already completed checkpoint succeeds again.
    ///
    /// # Returns
    ///
    /// `false` when no checkpoint exists or the write fails
    pub fn mark_completed(&mut self, site: &str, board: &str) -> bool {
        let mut checkpoint = match self.load(site, board) {
            Some(cp) => cp,
            None => {
                warn!(site, board, "cannot mark completed, no checkpoint");
                return false;
            }
        };

        checkpoint.status = CheckpointStatus::Completed;
        if self.save(&mut checkpoint) {
            info!(site, board, "crawl marked completed");
            true
        } else {
            false
        }
    }

    /// Records a fatal error against the (site, board) crawl
    ///
    /// The page cursor and seen set are left untouched so the crawl stays
    /// resumable; only the status and error counters change.
    ///
    /// # Returns
    ///
    /// `false` when no checkpoint exists or the write fails
    pub fn mark_error(&mut self, site: &str, board: &str, message: &str) -> bool {
        let mut checkpoint = match self.load(site, board) {
            Some(cp) => cp,
            None => {
                warn!(site, board, "cannot mark error, no checkpoint");
                return false;
            }
        };

        checkpoint.status = CheckpointStatus::Error;
        checkpoint.stats.error_count += 1;
        checkpoint.stats.last_error = Some(message.to_string());
        if self.save(&mut checkpoint) {
            warn!(site, board, error = message, "crawl marked errored");
            true
        } else {
            false
        }
    }

    /// Answers whether a checkpoint is stored for a (site, board) pair
    ///
    /// A storage error is logged and answered as `false`.
    pub fn exists(&self, site: &str, board: &str) -> bool {
        match self.store.exists(site, board) {
            Ok(found) => found,
            Err(e) => {
                warn!(site, board, error = %e, "failed to check for checkpoint");
                false
            }
        }
    }

    /// Deletes the checkpoint for a (site, board) pair
    ///
    /// # Returns
    ///
    /// `true` when a checkpoint was deleted
    pub fn clear(&mut self, site: &str, board: &str) -> bool {
        match self.store.delete_checkpoint(site, board) {
            Ok(deleted) => {
                if deleted {
                    info!(site, board, "checkpoint cleared");
                }
                deleted
            }
            Err(e) => {
                warn!(site, board, error = %e, "failed to clear checkpoint");
                false
            }
        }
    }

    /// Lists all stored checkpoints
    pub fn list(&self) -> Vec<Checkpoint> {
        match self.store.list_checkpoints() {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "failed to list checkpoints");
                Vec::new()
            }
        }
    }
}
