//! Checkpoint and resume support
//!
//! A crawl's durable state is a single [`Checkpoint`] record keyed by the
//! (site, board) pair: where paging got to, which item ids have been
//! processed, and running counters. [`CheckpointManager`] wraps a storage
//! backend with the save/mark operations the crawl loop uses, and
//! [`SeenTracker`] answers "have we handled this item before" using the
//! checkpoint's seen-id set plus a numeric ID range shortcut.

mod id_range;
mod manager;

pub use id_range::{IdClass, SeenTracker};
pub use manager::CheckpointManager;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status of a checkpointed crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStatus {
    Running,
    Completed,
    Error,
}

impl CheckpointStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Running counters carried inside a checkpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckpointStats {
    pub items_found: u64,
    pub items_completed: u64,
    pub items_failed: u64,
    pub images_downloaded: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

/// Durable state of one crawl, keyed by (site, board)
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub site: String,
    pub board: String,
    pub status: CheckpointStatus,
    /// Next list page to fetch
    pub current_page: u32,
    /// Most recently processed item id
    pub last_item_id: Option<String>,
    /// Smallest numeric item id seen so far
    pub min_item_id: Option<u64>,
    /// Largest numeric item id seen so far
    pub max_item_id: Option<u64>,
    /// All item ids processed for this (site, board)
    pub seen_ids: HashSet<String>,
    pub stats: CheckpointStats,
    /// RFC 3339 creation timestamp, preserved across updates
    pub created_at: String,
    /// RFC 3339 timestamp of the last save
    pub updated_at: String,
}

impl Checkpoint {
    /// Creates a fresh Running checkpoint starting at page 1
    pub fn new(site: &str, board: &str) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            site: site.to_string(),
            board: board.to_string(),
            status: CheckpointStatus::Running,
            current_page: 1,
            last_item_id: None,
            min_item_id: None,
            max_item_id: None,
            seen_ids: HashSet::new(),
            stats: CheckpointStats::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Records an item id as processed, widening the numeric range when the
    /// id parses as a number
    pub fn record_seen(&mut self, id: &str) {
        if let Ok(n) = id.parse::<u64>() {
            self.min_item_id = Some(self.min_item_id.map_or(n, |m| m.min(n)));
            self.max_item_id = Some(self.max_item_id.map_or(n, |m| m.max(n)));
        }
        self.seen_ids.insert(id.to_string());
        self.last_item_id = Some(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in &[
            CheckpointStatus::Running,
            CheckpointStatus::Completed,
            CheckpointStatus::Error,
        ] {
            let db_str = status.to_db_string();
            let parsed = CheckpointStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_status_invalid() {
        assert_eq!(CheckpointStatus::from_db_string("invalid"), None);
    }

    #[test]
    fn test_record_seen_tracks_range() {
        let mut cp = Checkpoint::new("example", "photo");
        cp.record_seen("100");
        cp.record_seen("50");
        cp.record_seen("200");

        assert_eq!(cp.min_item_id, Some(50));
        assert_eq!(cp.max_item_id, Some(200));
        assert_eq!(cp.last_item_id.as_deref(), Some("200"));
        assert_eq!(cp.seen_ids.len(), 3);
    }

    #[test]
    fn test_record_seen_non_numeric_leaves_range_alone() {
        let mut cp = Checkpoint::new("example", "photo");
        cp.record_seen("abc-123");

        assert_eq!(cp.min_item_id, None);
        assert_eq!(cp.max_item_id, None);
        assert!(cp.seen_ids.contains("abc-123"));
    }
}
