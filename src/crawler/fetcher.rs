//! Lightweight HTTP transport
//!
//! This module handles requests that do not need a browser:
//! - Building the shared HTTP client with the configured timeouts
//! - Picking a random User-Agent per request
//! - Turning responses and transport errors into a `FetchOutcome`

use crate::config::CrawlerConfig;
use rand::seq::SliceRandom;
use reqwest::header::{self, HeaderMap};
use reqwest::Client;
use std::time::Duration;

/// Status recorded when a fetch fails without an HTTP response
pub const FAILED_FETCH_STATUS: u16 = 500;

/// Result of one fetch attempt, from either transport
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The server answered, whatever the status
    Ok {
        status: u16,
        /// Response headers; empty for rendered pages
        headers: HeaderMap,
        /// Document body, present only for rendered pages
        content: Option<String>,
    },

    /// No usable response (connection error, timeout, browser failure)
    Failed {
        /// Synthetic status, always [`FAILED_FETCH_STATUS`]
        status: u16,
        reason: String,
    },
}

impl FetchOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            status: FAILED_FETCH_STATUS,
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Ok { status, .. } | Self::Failed { status, .. } => *status,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Ok { content, .. } => content.as_deref(),
            Self::Failed { .. } => None,
        }
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Self::Ok { headers, .. } => Some(headers),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Builds the lightweight HTTP client
///
/// # Arguments
///
/// * `config` - Crawler configuration (timeouts and worker count)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_millis(config.request_timeout_ms);

    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(config.workers)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Picks a User-Agent uniformly at random
pub fn random_user_agent(user_agents: &[String]) -> Option<&str> {
    user_agents
        .choose(&mut rand::thread_rng())
        .map(String::as_str)
}

/// Fetches a URL without rendering it
///
/// Only the status is of interest here, so the body is never read. Every
/// transport error becomes `FetchOutcome::Failed`.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `user_agent` - User-Agent header for this request, if any
pub async fn fetch_url(client: &Client, url: &str, user_agent: Option<&str>) -> FetchOutcome {
    let mut request = client.get(url);
    if let Some(ua) = user_agent {
        request = request.header(header::USER_AGENT, ua);
    }

    match request.send().await {
        Ok(response) => FetchOutcome::Ok {
            status: response.status().as_u16(),
            headers: response.headers().clone(),
            content: None,
        },
        Err(e) => {
            let reason = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                format!("Connection failed: {}", e)
            } else {
                e.to_string()
            };
            tracing::debug!("Fetch failed for {}: {}", url, reason);
            FetchOutcome::failed(reason)
        }
    }
}
