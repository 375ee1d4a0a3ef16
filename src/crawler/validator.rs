//! Standalone link validation
//!
//! Checks a single URL outside of any crawl. The first attempt is a HEAD
//! request with normal certificate checks; when it is refused with 403 or
//! fails at the transport level, the URL is retried with GET through a client
//! that skips certificate verification. Each retry waits out the
//! rate limiter's backoff first.

use super::{random_user_agent, RateLimiter};
use crate::config::Config;
use crate::Result;
use reqwest::{header, Client, Method, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Status code reported when no HTTP response was obtained
pub const NO_RESPONSE_STATUS: i32 = -1;

/// Verdict for one validated URL
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub url: String,
    pub valid: bool,
    /// HTTP status of the last attempt, or [`NO_RESPONSE_STATUS`]
    pub status_code: i32,
    /// Set only when the last attempt failed without a response
    pub error_message: Option<String>,
    /// Wall time across every attempt
    pub duration: Duration,
}

/// What a single attempt produced
enum Attempt {
    Response(StatusCode),
    /// Transport failure, worth retrying
    Error(String),
    /// The request could not even be built (malformed URL)
    Rejected(String),
}

impl Attempt {
    fn should_retry(&self) -> bool {
        match self {
            Self::Response(status) => *status == StatusCode::FORBIDDEN,
            Self::Error(_) => true,
            Self::Rejected(_) => false,
        }
    }
}

/// HEAD-then-GET link validator
pub struct LinkValidator {
    strict: Client,
    relaxed: Client,
    limiter: Arc<RateLimiter>,
    user_agents: Vec<String>,
    max_attempts: u32,
}

impl LinkValidator {
    /// Builds a validator with its own pair of HTTP clients
    ///
    /// # Arguments
    ///
    /// * `timeout` - Connect and overall timeout per attempt
    /// * `limiter` - Shared rate limiter; one permit covers all attempts on a URL
    /// * `max_attempts` - Total attempts per URL, first one included
    pub fn new(timeout: Duration, limiter: Arc<RateLimiter>, max_attempts: u32) -> Result<Self> {
        let strict = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        let relaxed = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self {
            strict,
            relaxed,
            limiter,
            user_agents: Vec::new(),
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn from_config(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self> {
        Ok(Self::new(
            Duration::from_millis(config.crawler.request_timeout_ms),
            limiter,
            config.rate_limit.max_attempts,
        )?
        .with_user_agents(config.crawler.user_agents.clone()))
    }

    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        self.user_agents = user_agents;
        self
    }

    /// Validates one URL
    ///
    /// A 403 answered again on the last attempt keeps its real status code;
    /// only a transport failure on the last attempt yields
    /// [`NO_RESPONSE_STATUS`] together with the error message.
    ///
    /// # Errors
    ///
    /// `LinkrotError::Cancelled` if the rate limiter is cancelled before a
    /// permit is granted. Per-URL failures are reported in the result.
    pub async fn validate(&self, url: &str) -> Result<ValidationResult> {
        let started = Instant::now();
        let _permit = self.limiter.acquire().await?;

        let mut attempt = self.attempt(&self.strict, Method::HEAD, url).await;
        let mut retries = 0;
        while attempt.should_retry() && retries + 1 < self.max_attempts {
            retries += 1;
            let delay = self.retry_delay(retries);
            tracing::debug!("Retrying {} with GET in {:?} (retry {})", url, delay, retries);
            tokio::time::sleep(delay).await;
            attempt = self.attempt(&self.relaxed, Method::GET, url).await;
        }

        let result = match attempt {
            Attempt::Response(status) => ValidationResult {
                url: url.to_string(),
                valid: (200..400).contains(&status.as_u16()),
                status_code: i32::from(status.as_u16()),
                error_message: None,
                duration: started.elapsed(),
            },
            Attempt::Error(message) | Attempt::Rejected(message) => ValidationResult {
                url: url.to_string(),
                valid: false,
                status_code: NO_RESPONSE_STATUS,
                error_message: Some(message),
                duration: started.elapsed(),
            },
        };

        tracing::debug!(
            "Validated {} -> {} (valid: {})",
            url,
            result.status_code,
            result.valid
        );
        Ok(result)
    }

    /// Pause before retry `retry` (1-based): `backoff_delay(retry + 1)`
    fn retry_delay(&self, retry: u32) -> Duration {
        self.limiter.backoff_delay(retry + 1)
    }

    async fn attempt(&self, client: &Client, method: Method, url: &str) -> Attempt {
        let mut request = client.request(method, url);
        if let Some(ua) = random_user_agent(&self.user_agents) {
            request = request.header(header::USER_AGENT, ua);
        }

        match request.send().await {
            Ok(response) => Attempt::Response(response.status()),
            Err(e) if e.is_builder() => Attempt::Rejected(e.to_string()),
            Err(e) => Attempt::Error(e.to_string()),
        }
    }
}
