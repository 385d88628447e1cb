//! Collaborator traits the crawl loop is built against
//!
//! The orchestrator owns sequencing, checkpointing, and dispatch; everything
//! site-specific arrives through these traits. Default HTTP/selector
//! implementations live next door, but tests and unusual sites can inject
//! their own.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::Result;

/// One entry discovered on a list page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlItem {
    /// Stable item identifier (thread id, article id)
    pub id: String,
    /// Absolute URL of the item's detail page
    pub url: String,
    pub title: Option<String>,
}

/// Fetches list and detail pages
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches one page of the board
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute page URL
    /// * `page` - 1-based page number; implementations may vary headers for
    ///   paged requests
    ///
    /// # Returns
    ///
    /// * `Ok(Some(html))` - Page body
    /// * `Ok(None)` - Page is benignly absent (past the end of the board)
    /// * `Err(_)` - Fetch failed after retries
    async fn fetch_page(&self, url: &str, page: u32) -> Result<Option<String>>;
}

/// Extracts items and paging hints from list-page HTML
pub trait ListParser: Send + Sync {
    /// Parses the items on a list page
    ///
    /// # Arguments
    ///
    /// * `html` - List page body
    /// * `base_url` - URL the page was fetched from, for resolving links
    fn parse_items(&self, html: &str, base_url: &str) -> Result<Vec<CrawlItem>>;

    /// Resolves the next-page link, when the page advertises one
    fn next_page_url(&self, html: &str, base_url: &str) -> Option<String>;

    /// Whether the page indicates more content exists
    fn has_more(&self, html: &str) -> bool;
}

/// Processes one dispatched item
///
/// Errors are absorbed by the task queue as per-item failures; they never
/// abort the crawl.
#[async_trait]
pub trait ItemWorker: Send + Sync {
    async fn process(&self, item: CrawlItem) -> anyhow::Result<()>;
}

/// External source of truth for already-handled item ids
///
/// When present, the orchestrator consults this before its own checkpoint
/// history, and a positive answer wins.
#[async_trait]
pub trait ItemAuthority: Send + Sync {
    async fn is_known(&self, id: &str) -> bool;
}

/// Explicit retry schedule for HTTP requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per request before giving up
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles per attempt after that
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Backoff to sleep after a failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
    }
}
