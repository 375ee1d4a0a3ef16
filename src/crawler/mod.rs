//! Crawler module for checking a site's links
//!
//! This module contains the crawl engine:
//! - Work queue with drain detection
//! - Rate limiting and retry backoff
//! - Dual-mode downloading (lightweight HTTP vs. rendered pages)
//! - Page processing and link extraction
//! - Result persistence and overall crawl coordination
//! - Standalone HEAD/GET link validation

mod coordinator;
mod downloader;
mod fetcher;
mod pipeline;
mod processor;
mod rate_limiter;
mod request;
mod scheduler;
mod service;
mod validator;

pub use coordinator::{Coordinator, CrawlCounters, CrawlJob};
pub use downloader::Downloader;
pub use fetcher::{build_http_client, fetch_url, random_user_agent, FetchOutcome, FAILED_FETCH_STATUS};
pub use pipeline::ResultPipeline;
pub use processor::{PageProcessor, ProcessedPage};
pub use rate_limiter::{RateLimiter, RatePermit};
pub use request::{CrawlRequest, SEED_DEPTH};
pub use scheduler::Scheduler;
pub use service::LinkCheckService;
pub use validator::{LinkValidator, ValidationResult, NO_RESPONSE_STATUS};
