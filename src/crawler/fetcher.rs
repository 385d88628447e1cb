//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeouts
//! - GET requests for list and detail pages
//! - Binary downloads for images
//! - Retry with exponential backoff for transient failures
//! - Ajax-style headers for paged board requests

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::crawler::traits::{PageFetcher, RetryPolicy};
use crate::{CrawlError, Result};

/// Header BBS backends use to distinguish Ajax page loads from full loads
const AJAX_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Default [`PageFetcher`] backed by reqwest
///
/// Transient failures (timeouts, connection errors, HTTP 429 and 5xx) are
/// retried on the configured schedule. HTTP 404 and 410 are not failures at
/// all: boards run out of pages, and the crawl loop treats an absent page as
/// the end of the road.
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    download_delay: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from fetch configuration
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            policy: RetryPolicy::from_config(config),
            download_delay: Duration::from_millis(config.download_delay_ms),
        })
    }

    /// Downloads a binary resource, typically an image
    ///
    /// # Returns
    ///
    /// * `Ok(Some(bytes))` - Resource body
    /// * `Ok(None)` - Resource is gone (404/410)
    /// * `Err(_)` - Download failed after retries
    pub async fn fetch_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        match self.get_with_retry(url, false).await? {
            Some(response) => {
                let bytes = response.bytes().await.map_err(|e| CrawlError::Fetch {
                    url: url.to_string(),
                    message: format!("body read failed: {}", e),
                })?;
                Ok(Some(bytes.to_vec()))
            }
            None => Ok(None),
        }
    }

    async fn get_with_retry(&self, url: &str, ajax: bool) -> Result<Option<reqwest::Response>> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let mut request = self.client.get(url);
            if ajax {
                request = request.header(AJAX_HEADER.0, AJAX_HEADER.1);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        if !self.download_delay.is_zero() {
                            tokio::time::sleep(self.download_delay).await;
                        }
                        return Ok(Some(response));
                    }
                    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                        debug!(url, status = %status, "page absent");
                        return Ok(None);
                    }
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        last_error = format!("HTTP {}", status);
                    } else {
                        // Client errors other than 404/410/429 will not
                        // improve with retries
                        return Err(CrawlError::Fetch {
                            url: url.to_string(),
                            message: format!("HTTP {}", status),
                        });
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < self.policy.max_attempts {
                let backoff = self.policy.backoff(attempt);
                warn!(
                    url,
                    attempt,
                    error = %last_error,
                    backoff_ms = backoff.as_millis() as u64,
                    "fetch attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(CrawlError::Fetch {
            url: url.to_string(),
            message: format!(
                "giving up after {} attempts: {}",
                self.policy.max_attempts, last_error
            ),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str, page: u32) -> Result<Option<String>> {
        // Page 1 is a normal document load; deeper pages go through the
        // board's Ajax endpoint convention
        let ajax = page > 1;
        match self.get_with_retry(url, ajax).await? {
            Some(response) => {
                let body = response.text().await.map_err(|e| CrawlError::Fetch {
                    url: url.to_string(),
                    message: format!("body read failed: {}", e),
                })?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }
}
