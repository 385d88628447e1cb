//! Selector-driven list page parser
//!
//! Turns configured CSS selectors into [`CrawlItem`]s. All selectors come
//! from the site section of the config; nothing here guesses at page
//! structure.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::SelectorConfig;
use crate::crawler::traits::{CrawlItem, ListParser};
use crate::{ConfigError, ConfigResult, Result};

/// Default [`ListParser`] backed by the scraper crate
pub struct SelectorListParser {
    item: Selector,
    link: Selector,
    title: Option<Selector>,
    id_attr: Option<String>,
    next_page: Option<Selector>,
    load_more: Option<Selector>,
}

impl SelectorListParser {
    /// Compiles the configured selectors
    pub fn new(config: &SelectorConfig) -> ConfigResult<Self> {
        Ok(Self {
            item: compile(&config.item)?,
            link: compile(&config.link)?,
            title: config.title.as_deref().map(compile).transpose()?,
            id_attr: config.id_attr.clone(),
            next_page: config.next_page.as_deref().map(compile).transpose()?,
            load_more: config.load_more.as_deref().map(compile).transpose()?,
        })
    }

    fn extract_item(&self, element: ElementRef<'_>, base: &Url) -> Option<CrawlItem> {
        let link = element.select(&self.link).next()?;
        let href = link.value().attr("href")?;
        let url = match base.join(href) {
            Ok(u) => u,
            Err(e) => {
                debug!(href, error = %e, "skipping item with unresolvable link");
                return None;
            }
        };

        let title = self
            .title
            .as_ref()
            .and_then(|sel| element.select(sel).next())
            .map(element_text)
            .or_else(|| Some(element_text(link)))
            .filter(|t| !t.is_empty());

        let id = self
            .id_attr
            .as_deref()
            .and_then(|attr| element.value().attr(attr))
            .map(str::to_string)
            .unwrap_or_else(|| derive_item_id(&url));

        Some(CrawlItem {
            id,
            url: url.to_string(),
            title,
        })
    }
}

impl ListParser for SelectorListParser {
    fn parse_items(&self, html: &str, base_url: &str) -> Result<Vec<CrawlItem>> {
        let base = Url::parse(base_url)?;
        let document = Html::parse_document(html);

        let items: Vec<CrawlItem> = document
            .select(&self.item)
            .filter_map(|el| self.extract_item(el, &base))
            .collect();

        debug!(count = items.len(), "parsed list page");
        Ok(items)
    }

    fn next_page_url(&self, html: &str, base_url: &str) -> Option<String> {
        let base = Url::parse(base_url).ok()?;
        let document = Html::parse_document(html);
        let next = document.select(self.next_page.as_ref()?).next()?;
        let href = next.value().attr("href")?;
        base.join(href).ok().map(|u| u.to_string())
    }

    fn has_more(&self, html: &str) -> bool {
        // With no paging selectors configured, paging is page-number driven
        // and only empty pages end the crawl
        if self.next_page.is_none() && self.load_more.is_none() {
            return true;
        }

        let document = Html::parse_document(html);
        if let Some(sel) = &self.next_page {
            if document.select(sel).next().is_some() {
                return true;
            }
        }
        if let Some(sel) = &self.load_more {
            if document.select(sel).next().is_some() {
                return true;
            }
        }
        false
    }
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Derives an item id from a detail URL
///
/// Prefers the longest digit run in the final path segment so that
/// "thread-48213-1-1.html" becomes "48213"; falls back to the extensionless
/// segment, then the full URL.
fn derive_item_id(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or("");
    let stem = segment.split('.').next().unwrap_or(segment);

    let mut best: &str = "";
    let mut start = None;
    for (i, c) in stem.char_indices() {
        if c.is_ascii_digit() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            if i - s > best.len() {
                best = &stem[s..i];
            }
        }
    }
    if let Some(s) = start {
        if stem.len() - s > best.len() {
            best = &stem[s..];
        }
    }

    if !best.is_empty() {
        best.to_string()
    } else if !stem.is_empty() {
        stem.to_string()
    } else {
        url.to_string()
    }
}
