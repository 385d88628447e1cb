//! Default per-item worker: download the images on an item's detail page
//!
//! Runs inside the task queue, so any error returned here is counted as a
//! single failed item and never touches the rest of the batch.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::crawler::fetcher::HttpFetcher;
use crate::crawler::traits::{CrawlItem, ItemWorker, PageFetcher};
use crate::dedup::Deduplicator;
use crate::{ConfigError, ConfigResult};

/// Fetches an item's detail page and saves its non-duplicate images
pub struct ImageItemWorker {
    fetcher: Arc<HttpFetcher>,
    images: Selector,
    dedup: Arc<Mutex<Deduplicator>>,
    image_dir: PathBuf,
    downloaded: AtomicU64,
}

impl ImageItemWorker {
    /// Creates a worker
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Shared HTTP fetcher
    /// * `image_selector` - CSS selector for images on a detail page
    /// * `dedup` - Shared deduplicator; the URL tier is consulted before any
    ///   download, the content tiers after
    /// * `image_dir` - Root directory images are written under, one
    ///   subdirectory per item id
    pub fn new(
        fetcher: Arc<HttpFetcher>,
        image_selector: &str,
        dedup: Arc<Mutex<Deduplicator>>,
        image_dir: PathBuf,
    ) -> ConfigResult<Self> {
        let images = Selector::parse(image_selector)
            .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", image_selector, e)))?;
        Ok(Self {
            fetcher,
            images,
            dedup,
            image_dir,
            downloaded: AtomicU64::new(0),
        })
    }

    /// Images saved to disk so far
    pub fn images_downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    fn extract_image_urls(&self, html: &str, page_url: &str) -> Vec<String> {
        let base = match Url::parse(page_url) {
            Ok(u) => u,
            Err(_) => return Vec::new(),
        };
        let document = Html::parse_document(html);
        document
            .select(&self.images)
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| base.join(src).ok())
            .map(|u| u.to_string())
            .collect()
    }
}

#[async_trait]
impl ItemWorker for ImageItemWorker {
    async fn process(&self, item: CrawlItem) -> anyhow::Result<()> {
        let html = match self.fetcher.fetch_page(&item.url, 1).await? {
            Some(html) => html,
            None => {
                debug!(id = %item.id, url = %item.url, "detail page gone, nothing to do");
                return Ok(());
            }
        };

        let image_urls = self.extract_image_urls(&html, &item.url);
        if image_urls.is_empty() {
            debug!(id = %item.id, "no images on detail page");
            return Ok(());
        }

        let item_dir = self.image_dir.join(&item.id);
        let mut dir_created = false;

        for (index, url) in image_urls.iter().enumerate() {
            if self.dedup.lock().await.is_duplicate_url(url) {
                continue;
            }

            let bytes = match self.fetcher.fetch_bytes(url).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    // One broken image does not fail the item
                    warn!(id = %item.id, url = %url, error = %e, "image download failed");
                    continue;
                }
            };

            if self.dedup.lock().await.is_duplicate_image(&bytes) {
                continue;
            }

            if !dir_created {
                tokio::fs::create_dir_all(&item_dir).await?;
                dir_created = true;
            }
            let path = item_dir.join(image_filename(url, index));
            tokio::fs::write(&path, &bytes).await?;
            self.downloaded.fetch_add(1, Ordering::Relaxed);
            debug!(id = %item.id, path = %path.display(), "saved image");
        }

        Ok(())
    }
}

/// Builds a safe local filename from an image URL
fn image_filename(url: &str, index: usize) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .unwrap_or_default();

    let safe: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.is_empty() || !safe.contains('.') {
        format!("image_{:03}.jpg", index)
    } else {
        safe
    }
}
