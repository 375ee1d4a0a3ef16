//! Sumi-Linkrot: a depth-bounded link-rot auditor
//!
//! This crate crawls a site from a seed URL, checks every discovered page and
//! embedded resource, and records reachability results per crawl task.

pub mod browser;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Linkrot operations
#[derive(Debug, Error)]
pub enum LinkrotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid task transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TaskStatus,
        to: state::TaskStatus,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("Operation cancelled")]
    Cancelled,

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
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Sumi-Linkrot operations
pub type Result<T> = std::result::Result<T, LinkrotError>;

// Re-export commonly used types
pub use cache::ResultCache;
pub use config::Config;
pub use crawler::{CrawlCounters, CrawlJob, LinkCheckService};
pub use state::{ContentKind, TaskStatus};
pub use storage::{LinkCheckResult, ResultType, TaskRecord};
pub use url::{is_external, is_page_link, is_valid, to_absolute};
