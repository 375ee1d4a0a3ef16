//! Configuration module for Sumi-Linkrot
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; missing sections fall back to the crawler defaults
//! (4 workers, depth 2, 5 rendering sessions, 3 concurrent validations).
//!
//! # Example
//!
//! ```no_run
//! use sumi_linkrot::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("linkrot.toml")).unwrap();
//! println!("Crawler will use {} workers", config.crawler.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, CacheConfig, Config, CrawlerConfig, OutputConfig, RateLimitConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
