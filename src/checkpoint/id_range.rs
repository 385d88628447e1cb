use std::collections::HashSet;

use crate::checkpoint::Checkpoint;

/// How an item id relates to the crawl's history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdClass {
    /// Numeric id above everything seen before; the site has fresh content
    Fresh,
    /// Already processed, or inside the contiguous numeric range already swept
    Covered,
    /// Numeric id below the swept range; old content never reached
    Backlog,
    /// Non-numeric id; only the seen set can vouch for it
    Unranked,
}

impl IdClass {
    /// Whether an item with this classification should be crawled
    pub fn should_crawl(&self) -> bool {
        !matches!(self, Self::Covered)
    }
}

/// In-memory view of which item ids a crawl has handled
///
/// The seen set is the source of truth. For numeric ids a [min, max] range
/// acts as a shortcut: anything inside the range counts as covered even if an
/// individual id is missing from the set, which keeps resumes cheap on boards
/// where ids are dense.
#[derive(Debug, Default)]
pub struct SeenTracker {
    seen: HashSet<String>,
    min_id: Option<u64>,
    max_id: Option<u64>,
}

impl SeenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tracker from a checkpoint's persisted state
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            seen: checkpoint.seen_ids.clone(),
            min_id: checkpoint.min_item_id,
            max_id: checkpoint.max_item_id,
        }
    }

    /// Number of ids tracked
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Records an id as handled
    pub fn record(&mut self, id: &str) {
        if let Ok(n) = id.parse::<u64>() {
            self.min_id = Some(self.min_id.map_or(n, |m| m.min(n)));
            self.max_id = Some(self.max_id.map_or(n, |m| m.max(n)));
        }
        self.seen.insert(id.to_string());
    }

    /// Classifies an item id against the crawl history
    pub fn classify(&self, id: &str) -> IdClass {
        if self.seen.contains(id) {
            return IdClass::Covered;
        }

        let n = match id.parse::<u64>() {
            Ok(n) => n,
            Err(_) => return IdClass::Unranked,
        };

        match (self.min_id, self.max_id) {
            (Some(min), Some(max)) => {
                if n > max {
                    IdClass::Fresh
                } else if n >= min {
                    IdClass::Covered
                } else {
                    IdClass::Backlog
                }
            }
            // No numeric history yet
            _ => IdClass::Fresh,
        }
    }
}
