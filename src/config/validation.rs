use crate::config::types::{
    BrowserConfig, CacheConfig, Config, CrawlerConfig, OutputConfig, RateLimitConfig,
};
use crate::ConfigError;
use url::Url;

/// Upper bound on crawl workers
const MAX_WORKERS: usize = 64;

/// Supported WebDriver flavours
const SUPPORTED_DRIVERS: &[&str] = &["firefox", "chrome"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_cache_config(&config.cache)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.max_depth < 1 {
        return Err(ConfigError::Validation(
            "max_depth must be >= 1 (the seed itself is depth 1)".to_string(),
        ));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.user_agents.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user_agents cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates rendering engine configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if !SUPPORTED_DRIVERS.contains(&config.driver.as_str()) {
        return Err(ConfigError::Validation(format!(
            "driver must be one of {:?}, got '{}'",
            SUPPORTED_DRIVERS, config.driver
        )));
    }

    let url = Url::parse(&config.webdriver_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid webdriver_url: {}", e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "webdriver_url must be http(s), got '{}'",
            config.webdriver_url
        )));
    }

    if let Some(path) = &config.driver_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "driver_path cannot be empty when set".to_string(),
            ));
        }
    }

    if config.pool_capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "pool_capacity must be >= 1, got {}",
            config.pool_capacity
        )));
    }

    if config.ready_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "ready_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.cookies.keys().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "cookie names cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates pacing and backoff configuration
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be >= 1, got {}",
            config.max_concurrent
        )));
    }

    if config.backoff_cap_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_cap_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_cap_ms, config.backoff_base_ms
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates cache sizing
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("max_tasks", config.max_tasks),
        ("task_capacity", config.task_capacity),
        ("global_capacity", config.global_capacity),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be >= 1", name)));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
