use super::{fetch_url, random_user_agent, CrawlRequest, FetchOutcome, RateLimiter};
use crate::browser::SessionPool;
use crate::Result;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Dual-mode downloader
///
/// Page-hinted requests are rendered in a pooled browser session; everything
/// else goes through the lightweight HTTP client. Both paths wait on the
/// shared rate limiter.
pub struct Downloader {
    client: Client,
    pool: Arc<SessionPool>,
    limiter: Arc<RateLimiter>,
    user_agents: Vec<String>,
    cookies: BTreeMap<String, String>,
}

impl Downloader {
    pub fn new(client: Client, pool: Arc<SessionPool>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            pool,
            limiter,
            user_agents: Vec::new(),
            cookies: BTreeMap::new(),
        }
    }

    /// User-Agent strings rotated across lightweight fetches
    pub fn with_user_agents(mut self, user_agents: Vec<String>) -> Self {
        self.user_agents = user_agents;
        self
    }

    /// Cookies set on the browser session for every rendered page
    pub fn with_cookies(mut self, cookies: BTreeMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Fetches a request with the transport matching its content kind
    ///
    /// Start and finish markers are recorded on the request on every path.
    /// Transport and rendering failures come back as `FetchOutcome::Failed`.
    ///
    /// # Errors
    ///
    /// Only `LinkrotError::Cancelled`, when the rate limiter is cancelled
    /// before a permit is granted.
    pub async fn fetch(&self, request: &mut CrawlRequest) -> Result<FetchOutcome> {
        request.mark_started();

        let permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                request.mark_finished(None);
                return Err(e);
            }
        };

        let outcome = if request.kind.is_html() {
            self.render(&request.url).await
        } else {
            let ua = random_user_agent(&self.user_agents);
            fetch_url(&self.client, &request.url, ua).await
        };
        drop(permit);

        request.mark_finished(Some(outcome.status()));
        tracing::debug!(
            "Fetched {} ({}) -> {} in {}ms",
            request.url,
            request.kind,
            outcome.status(),
            request.duration_ms()
        );
        Ok(outcome)
    }

    async fn render(&self, url: &str) -> FetchOutcome {
        match self.pool.render_page(url, &self.cookies).await {
            Ok(page) => FetchOutcome::Ok {
                status: page.status,
                headers: HeaderMap::new(),
                content: Some(page.html),
            },
            Err(e) => {
                tracing::warn!("Rendering failed for {}: {}", url, e);
                FetchOutcome::failed(e.to_string())
            }
        }
    }
}
