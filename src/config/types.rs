use serde::Deserialize;

/// Main configuration structure for boardwalk
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    pub storage: StorageConfig,
}

/// Target site identification and selector configuration
///
/// Selectors are always configured explicitly; boardwalk never guesses
/// site structure.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Human-readable site name (used in logs only)
    pub name: String,

    /// Base URL of the board or feed listing
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Board identifier for checkpointing (defaults to "all")
    #[serde(default = "default_board")]
    pub board: String,

    pub selectors: SelectorConfig,
}

/// CSS selectors describing the site's list and detail structure
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Selector matching one list entry (thread row / article card)
    pub item: String,

    /// Selector for the entry link, relative to the item element
    pub link: String,

    /// Selector for the entry title, relative to the item element
    #[serde(default)]
    pub title: Option<String>,

    /// Attribute on the item element carrying the item id; when absent the
    /// id is derived from the link URL
    #[serde(rename = "id-attr", default)]
    pub id_attr: Option<String>,

    /// Selector for the next-page link (paged boards)
    #[serde(rename = "next-page", default)]
    pub next_page: Option<String>,

    /// Selector for the "load more" affordance (endless feeds)
    #[serde(rename = "load-more", default)]
    pub load_more: Option<String>,

    /// Selector for images inside a detail page
    #[serde(rename = "detail-images", default = "default_image_selector")]
    pub detail_images: String,
}

/// Crawl loop behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of list pages to crawl (0 = unlimited)
    #[serde(rename = "max-pages", default)]
    pub max_pages: u32,

    /// Resume from an existing checkpoint by default
    #[serde(default = "default_true")]
    pub resume: bool,

    /// Consecutive pages with zero new items before paging stops
    #[serde(rename = "no-new-page-limit", default = "default_no_new_page_limit")]
    pub no_new_page_limit: u32,
}

/// Task queue tuning
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Worker count for the first run
    #[serde(rename = "initial-workers", default = "default_initial_workers")]
    pub initial_workers: usize,

    /// Upper bound on adaptive worker count
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: usize,

    /// Lower bound on adaptive worker count
    #[serde(rename = "min-workers", default = "default_min_workers")]
    pub min_workers: usize,

    /// Bounded channel capacity (backpressure limit)
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Worker idle timeout in milliseconds
    #[serde(rename = "idle-timeout-ms", default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Error rate above which the worker count shrinks between runs
    #[serde(rename = "error-threshold", default = "default_error_threshold")]
    pub error_threshold: f64,
}

/// HTTP fetch adapter tuning
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Attempts per URL before giving up
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts in milliseconds (doubles per attempt)
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Politeness delay after each successful fetch in milliseconds
    #[serde(rename = "download-delay-ms", default)]
    pub download_delay_ms: u64,
}

/// Deduplication engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Also compare decoded images by difference-hash
    #[serde(rename = "perceptual", default = "default_true")]
    pub perceptual: bool,
}

/// Storage paths
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite checkpoint database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory downloaded images are written to
    #[serde(rename = "image-dir")]
    pub image_dir: String,
}

fn default_board() -> String {
    "all".to_string()
}

fn default_image_selector() -> String {
    "img".to_string()
}

fn default_true() -> bool {
    true
}

fn default_no_new_page_limit() -> u32 {
    10
}

fn default_initial_workers() -> usize {
    5
}

fn default_max_workers() -> usize {
    20
}

fn default_min_workers() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_idle_timeout_ms() -> u64 {
    1000
}

fn default_error_threshold() -> f64 {
    0.10
}

fn default_user_agent() -> String {
    format!("boardwalk/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_workers: default_initial_workers(),
            max_workers: default_max_workers(),
            min_workers: default_min_workers(),
            queue_capacity: default_queue_capacity(),
            idle_timeout_ms: default_idle_timeout_ms(),
            error_threshold: default_error_threshold(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            download_delay_ms: 0,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            perceptual: true,
        }
    }
}
