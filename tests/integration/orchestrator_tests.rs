//! Integration tests for the crawl orchestrator
//!
//! These tests drive the full crawl loop end-to-end with scripted
//! collaborators and a real SQLite checkpoint database, plus one test that
//! goes through a wiremock HTTP server with the default fetcher.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use boardwalk::checkpoint::{Checkpoint, CheckpointManager, CheckpointStatus};
use boardwalk::config::{
    Config, CrawlerConfig, DedupConfig, FetchConfig, QueueConfig, SelectorConfig, SiteConfig,
    StorageConfig,
};
use boardwalk::crawler::{
    CrawlItem, CrawlOutcome, HttpFetcher, ItemWorker, Orchestrator, PageFetcher,
    SelectorListParser,
};
use boardwalk::storage::SqliteStore;
use boardwalk::Result;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "example";
const BOARD: &str = "photo";

fn test_config(db_path: &Path, image_dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            name: SITE.to_string(),
            base_url: "https://bbs.example.com/board".to_string(),
            board: BOARD.to_string(),
            selectors: SelectorConfig {
                item: "div.item".to_string(),
                link: "a".to_string(),
                title: None,
                id_attr: None,
                next_page: None,
                load_more: None,
                detail_images: "img".to_string(),
            },
        },
        crawler: CrawlerConfig {
            max_pages: 0,
            resume: true,
            no_new_page_limit: 3,
        },
        queue: QueueConfig {
            initial_workers: 2,
            idle_timeout_ms: 200,
            ..QueueConfig::default()
        },
        fetch: FetchConfig::default(),
        dedup: DedupConfig::default(),
        storage: StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            image_dir: image_dir.to_string_lossy().into_owned(),
        },
    }
}

/// Renders a list page containing the given item ids
fn list_page(ids: &[u32]) -> String {
    let rows: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="item"><a href="/thread/{}.html">Thread {}</a></div>"#,
                id, id
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", rows)
}

/// PageFetcher serving a fixed page map, recording what was requested
struct ScriptedFetcher {
    pages: HashMap<u32, String>,
    fetched: Mutex<Vec<u32>>,
    urls: Mutex<Vec<String>>,
    fail_on: Option<u32>,
}

impl ScriptedFetcher {
    fn new(pages: HashMap<u32, String>) -> Self {
        Self {
            pages,
            fetched: Mutex::new(Vec::new()),
            urls: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    fn fetched_pages(&self) -> Vec<u32> {
        self.fetched.lock().unwrap().clone()
    }

    fn fetched_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, url: &str, page: u32) -> Result<Option<String>> {
        self.fetched.lock().unwrap().push(page);
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail_on == Some(page) {
            return Err(boardwalk::CrawlError::Fetch {
                url: url.to_string(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(self.pages.get(&page).cloned())
    }
}

/// ItemWorker that records processed ids and fails the configured ones
#[derive(Default)]
struct ScriptedWorker {
    fail_ids: HashSet<String>,
    processed: Mutex<Vec<String>>,
}

impl ScriptedWorker {
    fn failing(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            processed: Mutex::new(Vec::new()),
        }
    }

    fn processed_ids(&self) -> Vec<String> {
        self.processed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemWorker for ScriptedWorker {
    async fn process(&self, item: CrawlItem) -> anyhow::Result<()> {
        self.processed.lock().unwrap().push(item.id.clone());
        if self.fail_ids.contains(&item.id) {
            anyhow::bail!("scripted failure for {}", item.id);
        }
        Ok(())
    }
}

struct TestHarness {
    _dir: tempfile::TempDir,
    config: Arc<Config>,
    db_path: PathBuf,
}

impl TestHarness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("crawl.db");
        let config = Arc::new(test_config(&db_path, &dir.path().join("images")));
        Self {
            _dir: dir,
            config,
            db_path,
        }
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(&self.db_path).unwrap()
    }

    fn orchestrator(
        &self,
        fetcher: Arc<ScriptedFetcher>,
        worker: Arc<ScriptedWorker>,
    ) -> Orchestrator<SqliteStore> {
        let parser = Arc::new(SelectorListParser::new(&self.config.site.selectors).unwrap());
        Orchestrator::new(
            Arc::clone(&self.config),
            self.store(),
            fetcher,
            parser,
            worker,
            None,
        )
    }

    fn load_checkpoint(&self) -> Option<Checkpoint> {
        CheckpointManager::new(self.store()).load(SITE, BOARD)
    }
}

#[tokio::test]
async fn test_full_crawl_counts_and_completes() {
    let harness = TestHarness::new();

    // Two pages of items, then the board runs out
    let mut pages = HashMap::new();
    pages.insert(1, list_page(&[101, 102, 103]));
    pages.insert(2, list_page(&[104, 105]));
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::failing(&["103"]));

    let mut orchestrator = harness.orchestrator(Arc::clone(&fetcher), Arc::clone(&worker));
    let summary = orchestrator.run(None).await.unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(summary.items_found, 5);
    assert_eq!(summary.items_completed, 4);
    assert_eq!(summary.items_failed, 1);

    let cp = harness.load_checkpoint().unwrap();
    assert_eq!(cp.status, CheckpointStatus::Completed);
    assert_eq!(cp.seen_ids.len(), 5);
    assert_eq!(cp.min_item_id, Some(101));
    assert_eq!(cp.max_item_id, Some(105));
    assert_eq!(cp.stats.items_completed, 4);
    assert_eq!(cp.stats.items_failed, 1);
    assert_eq!(worker.processed_ids().len(), 5);
}

#[tokio::test]
async fn test_resumes_from_checkpoint_cursor() {
    let harness = TestHarness::new();

    // A previous run got to page 5
    {
        let mut manager = CheckpointManager::new(harness.store());
        let mut cp = Checkpoint::new(SITE, BOARD);
        cp.current_page = 5;
        for id in [101, 102, 103] {
            cp.record_seen(&id.to_string());
        }
        assert!(manager.save(&mut cp));
    }

    let mut pages = HashMap::new();
    pages.insert(5, list_page(&[104, 105]));
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = harness.orchestrator(Arc::clone(&fetcher), Arc::clone(&worker));
    let summary = orchestrator.run(None).await.unwrap();

    // Pages 1-4 were never refetched
    assert_eq!(fetcher.fetched_pages()[0], 5);
    assert_eq!(summary.items_found, 2);

    let cp = harness.load_checkpoint().unwrap();
    assert_eq!(cp.status, CheckpointStatus::Completed);
    assert_eq!(cp.seen_ids.len(), 5);
}

#[tokio::test]
async fn test_known_items_are_not_redispatched() {
    let harness = TestHarness::new();

    {
        let mut manager = CheckpointManager::new(harness.store());
        let mut cp = Checkpoint::new(SITE, BOARD);
        for id in [101, 102] {
            cp.record_seen(&id.to_string());
        }
        assert!(manager.save(&mut cp));
    }

    // Page repeats two known items and adds one new
    let mut pages = HashMap::new();
    pages.insert(1, list_page(&[101, 102, 110]));
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = harness.orchestrator(fetcher, Arc::clone(&worker));
    let summary = orchestrator.run(None).await.unwrap();

    assert_eq!(summary.items_found, 1);
    assert_eq!(worker.processed_ids(), vec!["110".to_string()]);
}

#[tokio::test]
async fn test_breaker_trips_and_leaves_running() {
    let harness = TestHarness::new();

    // Everything on every page is already known
    {
        let mut manager = CheckpointManager::new(harness.store());
        let mut cp = Checkpoint::new(SITE, BOARD);
        for id in 100..200 {
            cp.record_seen(&id.to_string());
        }
        assert!(manager.save(&mut cp));
    }

    let mut pages = HashMap::new();
    for page in 1..=10 {
        pages.insert(page, list_page(&[110, 111, 112]));
    }
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = harness.orchestrator(Arc::clone(&fetcher), Arc::clone(&worker));
    let summary = orchestrator.run(None).await.unwrap();

    // no_new_page_limit is 3: pages 1, 2, 3 fetched, then the breaker trips
    assert_eq!(summary.outcome, CrawlOutcome::BreakerTripped);
    assert_eq!(fetcher.fetched_pages(), vec![1, 2, 3]);
    assert!(worker.processed_ids().is_empty());

    // Not completed: the next invocation retries from the stalled page
    let cp = harness.load_checkpoint().unwrap();
    assert_eq!(cp.status, CheckpointStatus::Running);
    assert_eq!(cp.current_page, 3);
}

#[tokio::test]
async fn test_completed_checkpoint_skips_crawl() {
    let harness = TestHarness::new();

    {
        let mut manager = CheckpointManager::new(harness.store());
        let mut cp = Checkpoint::new(SITE, BOARD);
        cp.status = CheckpointStatus::Completed;
        assert!(manager.save(&mut cp));
    }

    let fetcher = Arc::new(ScriptedFetcher::new(HashMap::new()));
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = harness.orchestrator(Arc::clone(&fetcher), worker);
    let summary = orchestrator.run(None).await.unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::AlreadyComplete);
    assert!(fetcher.fetched_pages().is_empty());
}

#[tokio::test]
async fn test_start_override_overwrites_cursor() {
    let harness = TestHarness::new();

    {
        let mut manager = CheckpointManager::new(harness.store());
        let mut cp = Checkpoint::new(SITE, BOARD);
        cp.status = CheckpointStatus::Completed;
        cp.current_page = 9;
        assert!(manager.save(&mut cp));
    }

    // An explicit start page recrawls even a completed board
    let mut pages = HashMap::new();
    pages.insert(2, list_page(&[201]));
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = harness.orchestrator(Arc::clone(&fetcher), worker);
    let summary = orchestrator.run(Some(2)).await.unwrap();

    assert_eq!(fetcher.fetched_pages()[0], 2);
    assert_eq!(summary.items_found, 1);
}

#[tokio::test]
async fn test_fatal_fetch_error_marks_checkpoint() {
    let harness = TestHarness::new();

    let mut pages = HashMap::new();
    pages.insert(1, list_page(&[101]));
    let mut fetcher = ScriptedFetcher::new(pages);
    fetcher.fail_on = Some(2);
    let fetcher = Arc::new(fetcher);
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = harness.orchestrator(fetcher, worker);
    let result = orchestrator.run(None).await;
    assert!(result.is_err());

    // Checkpoint keeps the progress made before the failure
    let cp = harness.load_checkpoint().unwrap();
    assert_eq!(cp.status, CheckpointStatus::Error);
    assert_eq!(cp.stats.error_count, 1);
    assert!(cp.stats.last_error.is_some());
    assert!(cp.seen_ids.contains("101"));
    assert_eq!(cp.current_page, 2);
}

#[tokio::test]
async fn test_max_pages_budget_completes() {
    let harness = TestHarness::new();

    let mut pages = HashMap::new();
    for page in 1..=5 {
        pages.insert(page, list_page(&[page * 10, page * 10 + 1]));
    }
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::default());

    let mut config = test_config(&harness.db_path, Path::new("/tmp/unused"));
    config.crawler.max_pages = 2;
    let parser = Arc::new(SelectorListParser::new(&config.site.selectors).unwrap());
    let mut orchestrator = Orchestrator::new(
        Arc::new(config),
        harness.store(),
        Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        parser,
        worker,
        None,
    );
    let summary = orchestrator.run(None).await.unwrap();

    // Hitting the page budget is a clean stop, not an interruption
    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.pages_crawled, 2);
    assert_eq!(fetcher.fetched_pages(), vec![1, 2]);

    let cp = harness.load_checkpoint().unwrap();
    assert_eq!(cp.status, CheckpointStatus::Completed);
}

#[tokio::test]
async fn test_start_override_recrawls_seen_items() {
    let harness = TestHarness::new();

    // A previous run already saw everything on page 1
    {
        let mut manager = CheckpointManager::new(harness.store());
        let mut cp = Checkpoint::new(SITE, BOARD);
        cp.current_page = 4;
        for id in [101, 102] {
            cp.record_seen(&id.to_string());
        }
        assert!(manager.save(&mut cp));
    }

    let mut pages = HashMap::new();
    pages.insert(1, list_page(&[101, 102]));
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = harness.orchestrator(fetcher, Arc::clone(&worker));
    let summary = orchestrator.run(Some(1)).await.unwrap();

    // The override discards the old seen set, so both items run again
    assert_eq!(summary.items_found, 2);
    let mut processed = worker.processed_ids();
    processed.sort();
    assert_eq!(processed, vec!["101".to_string(), "102".to_string()]);

    let cp = harness.load_checkpoint().unwrap();
    assert_eq!(cp.seen_ids.len(), 2);
}

#[tokio::test]
async fn test_follows_parsed_next_page_link() {
    let harness = TestHarness::new();

    // Page 1 advertises its successor with an explicit link
    let page_one = format!(
        r#"<html><body>{}<a class="next" href="/board/list_2.html">next</a></body></html>"#,
        r#"<div class="item"><a href="/thread/101.html">Thread 101</a></div>"#
    );
    let mut pages = HashMap::new();
    pages.insert(1, page_one);
    pages.insert(2, list_page(&[102]));
    let fetcher = Arc::new(ScriptedFetcher::new(pages));
    let worker = Arc::new(ScriptedWorker::default());

    let mut config = test_config(&harness.db_path, Path::new("/tmp/unused"));
    config.site.selectors.next_page = Some("a.next".to_string());
    let parser = Arc::new(SelectorListParser::new(&config.site.selectors).unwrap());
    let mut orchestrator = Orchestrator::new(
        Arc::new(config),
        harness.store(),
        Arc::clone(&fetcher) as Arc<dyn PageFetcher>,
        parser,
        worker,
        None,
    );
    let summary = orchestrator.run(None).await.unwrap();

    // The advertised link wins over a synthesized page-number URL
    assert_eq!(
        fetcher.fetched_urls(),
        vec![
            "https://bbs.example.com/board".to_string(),
            "https://bbs.example.com/board/list_2.html".to_string(),
        ]
    );
    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.items_found, 2);
}

#[tokio::test]
async fn test_end_to_end_over_http() {
    let server = MockServer::start().await;

    // Page 1 has two items; page 2 does not exist, ending the board
    Mock::given(method("GET"))
        .and(path("/board"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_page(&[301, 302])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let mut config = test_config(&db_path, &dir.path().join("images"));
    config.site.base_url = format!("{}/board", server.uri());
    config.fetch.max_attempts = 1;
    let config = Arc::new(config);

    let fetcher = Arc::new(HttpFetcher::new(&config.fetch).unwrap());
    let parser = Arc::new(SelectorListParser::new(&config.site.selectors).unwrap());
    let worker = Arc::new(ScriptedWorker::default());

    let mut orchestrator = Orchestrator::new(
        Arc::clone(&config),
        SqliteStore::new(&db_path).unwrap(),
        fetcher,
        parser,
        Arc::clone(&worker) as Arc<dyn ItemWorker>,
        None,
    );
    let summary = orchestrator.run(None).await.unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.items_found, 2);
    assert_eq!(summary.items_completed, 2);

    let mut processed = worker.processed_ids();
    processed.sort();
    assert_eq!(processed, vec!["301".to_string(), "302".to_string()]);
}
