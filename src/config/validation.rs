use crate::config::types::{Config, CrawlerConfig, FetchConfig, QueueConfig, SiteConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_queue_config(&config.queue)?;
    validate_fetch_config(&config.fetch)?;
    validate_storage_config(config)?;
    Ok(())
}

/// Validates site identification and selectors
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url must use http or https scheme, got '{}'",
            url.scheme()
        )));
    }

    if config.board.is_empty() {
        return Err(ConfigError::Validation(
            "board cannot be empty".to_string(),
        ));
    }

    validate_selector(&config.selectors.item)?;
    validate_selector(&config.selectors.link)?;
    validate_selector(&config.selectors.detail_images)?;
    if let Some(s) = &config.selectors.title {
        validate_selector(s)?;
    }
    if let Some(s) = &config.selectors.next_page {
        validate_selector(s)?;
    }
    if let Some(s) = &config.selectors.load_more {
        validate_selector(s)?;
    }

    Ok(())
}

/// Validates crawl loop configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.no_new_page_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "no-new-page-limit must be >= 1, got {}",
            config.no_new_page_limit
        )));
    }

    Ok(())
}

/// Validates queue configuration
fn validate_queue_config(config: &QueueConfig) -> Result<(), ConfigError> {
    if config.min_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "min-workers must be >= 1, got {}",
            config.min_workers
        )));
    }

    if config.max_workers < config.min_workers {
        return Err(ConfigError::Validation(format!(
            "max-workers ({}) must be >= min-workers ({})",
            config.max_workers, config.min_workers
        )));
    }

    if config.initial_workers < config.min_workers || config.initial_workers > config.max_workers {
        return Err(ConfigError::Validation(format!(
            "initial-workers ({}) must lie between min-workers ({}) and max-workers ({})",
            config.initial_workers, config.min_workers, config.max_workers
        )));
    }

    if config.queue_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "queue-capacity must be >= 1, got {}",
            config.queue_capacity
        )));
    }

    if !(0.0..=1.0).contains(&config.error_threshold) {
        return Err(ConfigError::Validation(format!(
            "error-threshold must be between 0.0 and 1.0, got {}",
            config.error_threshold
        )));
    }

    Ok(())
}

/// Validates fetch adapter configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates storage paths
fn validate_storage_config(config: &Config) -> Result<(), ConfigError> {
    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.storage.image_dir.is_empty() {
        return Err(ConfigError::Validation(
            "image-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates a single CSS selector string
fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    if selector.is_empty() {
        return Err(ConfigError::InvalidSelector(
            "selector cannot be empty".to_string(),
        ));
    }

    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", selector, e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_selector() {
        assert!(validate_selector("div.news-item").is_ok());
        assert!(validate_selector("a.more, .load-more").is_ok());

        assert!(validate_selector("").is_err());
        assert!(validate_selector("div[unclosed").is_err());
    }

    #[test]
    fn test_validate_queue_config_bounds() {
        let mut config = QueueConfig::default();
        assert!(validate_queue_config(&config).is_ok());

        config.min_workers = 0;
        assert!(validate_queue_config(&config).is_err());

        config.min_workers = 10;
        config.max_workers = 5;
        assert!(validate_queue_config(&config).is_err());
    }

    #[test]
    fn test_validate_queue_config_threshold() {
        let mut config = QueueConfig::default();
        config.error_threshold = 1.5;
        assert!(validate_queue_config(&config).is_err());

        config.error_threshold = 0.10;
        assert!(validate_queue_config(&config).is_ok());
    }

    #[test]
    fn test_validate_fetch_config() {
        let config = FetchConfig::default();
        assert!(validate_fetch_config(&config).is_ok());

        let mut bad = FetchConfig::default();
        bad.max_attempts = 0;
        assert!(validate_fetch_config(&bad).is_err());
    }
}
