//! Boardwalk: a resumable BBS and news-feed crawl orchestrator
//!
//! This crate implements the orchestration layer for long-running crawl jobs:
//! a bounded concurrent task queue with adaptive worker-count control, a
//! checkpoint/resume state machine keyed by (site, board), and a multi-tier
//! image deduplication engine. Site-specific fetching, parsing, and per-item
//! work are injected collaborators; default HTTP/selector adapters are
//! provided.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod queue;
pub mod storage;

use thiserror::Error;

/// Main error type for boardwalk operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Parse failed on page {page}: {message}")]
    Parse { page: u32, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// Result type alias for boardwalk operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use checkpoint::{Checkpoint, CheckpointManager, CheckpointStats, CheckpointStatus};
pub use config::Config;
pub use crawler::{CrawlItem, Orchestrator};
pub use dedup::Deduplicator;
pub use queue::{AdaptiveTaskQueue, QueueStats, TaskQueue};
