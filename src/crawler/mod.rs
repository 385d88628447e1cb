//! Crawl loop and its collaborators
//!
//! The [`Orchestrator`] drives a board crawl page by page, resuming from and
//! persisting a checkpoint as it goes. Everything site-facing is a trait:
//! [`PageFetcher`] for HTTP, [`ListParser`] for list pages, [`ItemWorker`]
//! for per-item work, and the optional [`ItemAuthority`] for external dedup.
//! Default implementations backed by reqwest and scraper live here too.

mod fetcher;
mod orchestrator;
mod parser;
mod traits;
mod worker;

pub use fetcher::{build_http_client, HttpFetcher};
pub use orchestrator::{page_url, CrawlOutcome, CrawlSummary, Orchestrator};
pub use parser::SelectorListParser;
pub use traits::{CrawlItem, ItemAuthority, ItemWorker, ListParser, PageFetcher, RetryPolicy};
pub use worker::ImageItemWorker;
