//! Crawl orchestrator - main crawl loop
//!
//! This module contains the main loop that coordinates a crawl:
//! - Determining where to start from the checkpoint
//! - Fetching and parsing list pages sequentially
//! - Filtering already-handled items
//! - Dispatching new items to the concurrent task queue
//! - Persisting the checkpoint after every page
//!
//! Pages are strictly sequential; only the items found on a page are
//! processed concurrently.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::checkpoint::{
    Checkpoint, CheckpointManager, CheckpointStatus, IdClass, SeenTracker,
};
use crate::config::Config;
use crate::crawler::traits::{CrawlItem, ItemAuthority, ItemWorker, ListParser, PageFetcher};
use crate::queue::{AdaptiveTaskQueue, TuningState};
use crate::storage::CheckpointStore;
use crate::Result;

/// How a crawl run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The board was exhausted or the page budget reached; the checkpoint is
    /// marked Completed
    Completed,
    /// Too many consecutive pages without new items; the checkpoint stays
    /// Running so the next invocation retries from the same page
    BreakerTripped,
    /// The checkpoint was already Completed, nothing was fetched
    AlreadyComplete,
}

/// What one crawl run did
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub outcome: CrawlOutcome,
    /// List pages fetched during this run
    pub pages_crawled: u32,
    /// New items dispatched during this run
    pub items_found: u64,
    pub items_completed: u64,
    pub items_failed: u64,
    /// Worker tuning state after the run
    pub tuning: TuningState,
}

/// Sequences one board's crawl from checkpoint to checkpoint
pub struct Orchestrator<S: CheckpointStore> {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn ListParser>,
    worker: Arc<dyn ItemWorker>,
    authority: Option<Arc<dyn ItemAuthority>>,
    checkpoints: CheckpointManager<S>,
    queue: AdaptiveTaskQueue,
}

impl<S: CheckpointStore> Orchestrator<S> {
    pub fn new(
        config: Arc<Config>,
        store: S,
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn ListParser>,
        worker: Arc<dyn ItemWorker>,
        authority: Option<Arc<dyn ItemAuthority>>,
    ) -> Self {
        let queue = AdaptiveTaskQueue::from_config(&config.queue);
        Self {
            config,
            fetcher,
            parser,
            worker,
            authority,
            checkpoints: CheckpointManager::new(store),
            queue,
        }
    }

    /// Access to the checkpoint manager, for status reporting and cleanup
    pub fn checkpoints_mut(&mut self) -> &mut CheckpointManager<S> {
        &mut self.checkpoints
    }

    /// Runs the crawl to one of its stopping conditions
    ///
    /// # Arguments
    ///
    /// * `start_override` - Explicit start page; overwrites the checkpoint
    ///   cursor when given
    ///
    /// # Returns
    ///
    /// A summary of this run. Collaborator failures on the page level
    /// (fetch or parse) mark the checkpoint errored and propagate; per-item
    /// failures are absorbed by the task queue.
    pub async fn run(&mut self, start_override: Option<u32>) -> Result<CrawlSummary> {
        let site = self.config.site.name.clone();
        let board = self.config.site.board.clone();

        let mut checkpoint = if self.config.crawler.resume {
            self.checkpoints.load_or_create(&site, &board)
        } else {
            info!(site, board, "resume disabled, starting fresh");
            Checkpoint::new(&site, &board)
        };

        if checkpoint.status == CheckpointStatus::Completed && start_override.is_none() {
            info!(site, board, "crawl already completed, skipping");
            return Ok(self.summary(CrawlOutcome::AlreadyComplete, 0, 0, 0, 0));
        }

        let mut page = match start_override {
            Some(p) => {
                let p = p.max(1);
                info!(
                    site,
                    board,
                    from = checkpoint.current_page,
                    to = p,
                    "start page override, overwriting existing checkpoint"
                );
                // An explicit start is a recrawl order: the old seen set and
                // range must not filter anything
                checkpoint = Checkpoint::new(&site, &board);
                checkpoint.current_page = p;
                p
            }
            None => checkpoint.current_page.max(1),
        };

        let mut tracker = SeenTracker::from_checkpoint(&checkpoint);
        info!(
            site,
            board,
            page,
            known_items = tracker.len(),
            "starting crawl"
        );

        // A Running checkpoint must exist before the first dispatch so any
        // fatal path has something to mark
        checkpoint.status = CheckpointStatus::Running;
        self.checkpoints.save(&mut checkpoint);

        let max_pages = self.config.crawler.max_pages;
        let no_new_limit = self.config.crawler.no_new_page_limit;
        let mut consecutive_no_new = 0u32;
        let mut pages_crawled = 0u32;
        // Parsed next-page link for the coming iteration; page-number URLs
        // are only synthesized when the page does not advertise one
        let mut pending_url: Option<String> = None;
        let mut run_found = 0u64;
        let mut run_completed = 0u64;
        let mut run_failed = 0u64;
        let mut outcome = CrawlOutcome::Completed;

        loop {
            if max_pages > 0 && pages_crawled >= max_pages {
                // A configured page budget is a clean stop, same as running
                // out of board
                info!(pages_crawled, "page budget reached, stopping");
                break;
            }

            let url = pending_url
                .take()
                .unwrap_or_else(|| page_url(&self.config.site.base_url, page));
            debug!(page, url, "fetching list page");

            let html = match self.fetcher.fetch_page(&url, page).await {
                Ok(Some(html)) => html,
                Ok(None) => {
                    info!(page, "list page absent, board exhausted");
                    break;
                }
                Err(e) => {
                    self.checkpoints.mark_error(&site, &board, &e.to_string());
                    return Err(e);
                }
            };
            pages_crawled += 1;

            let items = match self.parser.parse_items(&html, &url) {
                Ok(items) => items,
                Err(e) => {
                    self.checkpoints.mark_error(&site, &board, &e.to_string());
                    return Err(e);
                }
            };
            if items.is_empty() {
                info!(page, "no items on list page, board exhausted");
                break;
            }

            let to_crawl = self.filter_new(&tracker, items).await;

            if to_crawl.is_empty() {
                consecutive_no_new += 1;
                debug!(
                    page,
                    consecutive_no_new, "every item on this page already handled"
                );
                // Stay on this page so a tripped breaker retries it next run
                checkpoint.current_page = page;
                self.checkpoints.save(&mut checkpoint);

                if consecutive_no_new >= no_new_limit {
                    warn!(
                        pages = consecutive_no_new,
                        "no new items for too many consecutive pages, stopping"
                    );
                    outcome = CrawlOutcome::BreakerTripped;
                    break;
                }
                if !self.parser.has_more(&html) {
                    break;
                }
                pending_url = self.parser.next_page_url(&html, &url);
                page += 1;
                continue;
            }

            consecutive_no_new = 0;
            run_found += to_crawl.len() as u64;
            checkpoint.stats.items_found += to_crawl.len() as u64;
            for item in &to_crawl {
                tracker.record(&item.id);
                checkpoint.record_seen(&item.id);
            }

            info!(page, new_items = to_crawl.len(), "dispatching items");
            let worker = Arc::clone(&self.worker);
            let stats = self
                .queue
                .run(to_crawl, move |item| {
                    let worker = Arc::clone(&worker);
                    async move { worker.process(item).await }
                })
                .await;

            run_completed += stats.completed as u64;
            run_failed += stats.failed as u64;
            checkpoint.stats.items_completed += stats.completed as u64;
            checkpoint.stats.items_failed += stats.failed as u64;

            checkpoint.current_page = page + 1;
            self.checkpoints.save(&mut checkpoint);

            if !self.parser.has_more(&html) {
                info!(page, "no further pages advertised");
                break;
            }
            pending_url = self.parser.next_page_url(&html, &url);
            page += 1;
        }

        if outcome == CrawlOutcome::Completed {
            self.checkpoints.mark_completed(&site, &board);
        }

        info!(
            site,
            board,
            ?outcome,
            pages_crawled,
            items = run_found,
            completed = run_completed,
            failed = run_failed,
            "crawl run finished"
        );
        Ok(self.summary(outcome, pages_crawled, run_found, run_completed, run_failed))
    }

    /// Drops items the crawl has already handled
    ///
    /// The external authority, when present, is consulted first and a
    /// positive answer wins over local history.
    async fn filter_new(&self, tracker: &SeenTracker, items: Vec<CrawlItem>) -> Vec<CrawlItem> {
        let mut fresh = 0usize;
        let mut to_crawl = Vec::new();

        for item in items {
            if let Some(authority) = &self.authority {
                if authority.is_known(&item.id).await {
                    debug!(id = %item.id, "item known to external authority");
                    continue;
                }
            }
            match tracker.classify(&item.id) {
                IdClass::Covered => continue,
                IdClass::Fresh => fresh += 1,
                IdClass::Backlog => debug!(id = %item.id, "backlog item below swept range"),
                IdClass::Unranked => debug!(id = %item.id, "unranked item id"),
            }
            to_crawl.push(item);
        }

        if fresh > 0 {
            info!(fresh, "site has fresh content");
        }
        to_crawl
    }

    fn summary(
        &self,
        outcome: CrawlOutcome,
        pages_crawled: u32,
        items_found: u64,
        items_completed: u64,
        items_failed: u64,
    ) -> CrawlSummary {
        CrawlSummary {
            outcome,
            pages_crawled,
            items_found,
            items_completed,
            items_failed,
            tuning: self.queue.tuning().clone(),
        }
    }
}

/// Builds the URL for a 1-based list page number
///
/// Page 1 is the base URL itself; deeper pages append a `page` query
/// parameter, respecting any existing query string.
pub fn page_url(base_url: &str, page: u32) -> String {
    if page <= 1 {
        return base_url.to_string();
    }
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{}{}page={}", base_url, separator, page)
}
