use super::{
    build_http_client, Coordinator, CrawlCounters, CrawlJob, Downloader, LinkValidator,
    RateLimiter,
};
use crate::browser::{BrowserKind, ProcessReaper, SessionFactory, SessionPool};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::storage::SharedStorage;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Entry point for creating and running link-check tasks
///
/// Owns every component shared between crawls: the rendering session pool,
/// the rate limiter, the result cache and the HTTP client. Components are
/// built once here and handed to each crawl by reference.
pub struct LinkCheckService {
    config: Arc<Config>,
    storage: SharedStorage,
    cache: Arc<ResultCache>,
    limiter: Arc<RateLimiter>,
    pool: Arc<SessionPool>,
    downloader: Arc<Downloader>,
}

impl LinkCheckService {
    /// Wires the crawl components from configuration
    ///
    /// The session pool is sized to `min(pool_capacity, workers)`.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `storage` - Task and result store
    /// * `factory` - Creates rendering sessions
    /// * `reaper` - Orphaned driver cleanup run at shutdown
    pub fn new(
        config: Config,
        storage: SharedStorage,
        factory: Arc<dyn SessionFactory>,
        reaper: Arc<dyn ProcessReaper>,
    ) -> Result<Self> {
        let kind: BrowserKind = config.browser.driver.parse()?;
        let capacity = config.browser.pool_capacity.min(config.crawler.workers);
        let pool = SessionPool::new(kind, capacity, factory, reaper).with_timing(
            Duration::from_millis(config.browser.ready_timeout_ms),
            Duration::from_millis(config.browser.settle_delay_ms),
        );
        let pool = Arc::new(pool);

        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        let client = build_http_client(&config.crawler)?;
        let downloader = Downloader::new(client, Arc::clone(&pool), Arc::clone(&limiter))
            .with_user_agents(config.crawler.user_agents.clone())
            .with_cookies(config.browser.cookies.clone());

        tracing::debug!(
            "Link check service ready ({} {} session(s), {} worker(s))",
            capacity,
            kind,
            config.crawler.workers
        );

        Ok(Self {
            cache: Arc::new(ResultCache::new(&config.cache)),
            config: Arc::new(config),
            storage,
            limiter,
            pool,
            downloader: Arc::new(downloader),
        })
    }

    /// Persists a new task in the `RUNNING` state
    ///
    /// # Arguments
    ///
    /// * `name` - Task name
    /// * `config` - Request parameters stored with the task
    ///
    /// # Returns
    ///
    /// The new task's ID
    pub fn create_task(&self, name: &str, config: &serde_json::Value) -> Result<i64> {
        let mut storage = self.storage.lock().unwrap_or_else(|e| e.into_inner());
        let task_id = storage.create_task(name, &config.to_string())?;
        tracing::info!("Created task {} ({})", task_id, name);
        Ok(task_id)
    }

    /// Starts a crawl in the background
    ///
    /// Returns immediately; the handle resolves to the crawl's counters once
    /// the task has been finalized.
    pub fn start_crawl(&self, job: CrawlJob) -> JoinHandle<Result<CrawlCounters>> {
        let coordinator = self.coordinator();
        tokio::spawn(async move { coordinator.run_crawl(job).await })
    }

    fn coordinator(&self) -> Coordinator {
        Coordinator::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.cache),
            Arc::clone(&self.downloader),
            self.config.crawler.workers,
            self.config.crawler.max_depth,
        )
    }

    /// Builds a standalone validator sharing this service's rate limiter
    pub fn validator(&self) -> Result<LinkValidator> {
        LinkValidator::from_config(&self.config, Arc::clone(&self.limiter))
    }

    /// Shuts the session pool down
    ///
    /// In-flight renders complete first; later crawls record every page
    /// request as failed.
    pub async fn shutdown(&self) -> Result<usize> {
        Ok(self.pool.shutdown_all().await?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }
}
