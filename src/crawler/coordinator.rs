//! Crawler coordinator - main crawl orchestration logic
//!
//! A crawl seeds the work queue with the root request and runs a fixed pool
//! of workers over it. Each worker repeatedly dequeues a request, downloads
//! it, processes the page, persists the results and pushes the children back
//! onto the queue. Workers return their own counters; the coordinator sums
//! them once every worker has seen the queue drain.
//!
//! The task record is written exactly once, after the drain or after a fatal
//! error aborted the queue.

use super::{CrawlRequest, Downloader, FetchOutcome, PageProcessor, ResultPipeline, Scheduler};
use crate::cache::ResultCache;
use crate::state::TaskStatus;
use crate::storage::{LinkCheckResult, SharedStorage};
use crate::url::{canonical_url, ExcludeMatcher};
use crate::{LinkrotError, Result};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Parameters of one crawl
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlJob {
    pub task_id: i64,
    pub seed_url: String,
    pub exclude_patterns: Vec<String>,
    /// CSS selector whose matches are stored with each page result
    pub selector: Option<String>,
}

impl CrawlJob {
    pub fn new(task_id: i64, seed_url: impl Into<String>) -> Self {
        Self {
            task_id,
            seed_url: seed_url.into(),
            exclude_patterns: Vec::new(),
            selector: None,
        }
    }

    pub fn with_excludes(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector;
        self
    }
}

/// Aggregate counters of a crawl
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlCounters {
    /// Requests checked (re-attached results are not counted)
    pub total: u64,
    /// Checked requests whose final status is missing or outside `[200, 400)`
    pub invalid: u64,
}

impl CrawlCounters {
    pub fn record(&mut self, status: Option<u16>) {
        self.total += 1;
        if !status.is_some_and(LinkCheckResult::is_valid_status) {
            self.invalid += 1;
        }
    }

    pub fn merge(&mut self, other: CrawlCounters) {
        self.total += other.total;
        self.invalid += other.invalid;
    }
}

/// Runs crawls against shared components
#[derive(Clone)]
pub struct Coordinator {
    storage: SharedStorage,
    cache: Arc<ResultCache>,
    downloader: Arc<Downloader>,
    workers: usize,
    max_depth: u32,
}

/// Everything a worker needs, shared across the pool
struct WorkerContext {
    scheduler: Scheduler,
    downloader: Arc<Downloader>,
    processor: PageProcessor,
    pipeline: ResultPipeline,
}

impl Coordinator {
    /// Creates a coordinator
    ///
    /// # Arguments
    ///
    /// * `storage` - Result and task store
    /// * `cache` - Result cache; its task namespace is the crawl's visited set
    /// * `downloader` - Transport for every request
    /// * `workers` - Number of concurrent workers (at least 1)
    /// * `max_depth` - Depth limit; the seed is depth 1
    pub fn new(
        storage: SharedStorage,
        cache: Arc<ResultCache>,
        downloader: Arc<Downloader>,
        workers: usize,
        max_depth: u32,
    ) -> Self {
        Self {
            storage,
            cache,
            downloader,
            workers: workers.max(1),
            max_depth,
        }
    }

    /// Crawls from the job's seed until the queue drains, then finalizes the task
    ///
    /// Per-URL failures are recorded as invalid results and never abort the
    /// crawl. A storage failure, a cancelled rate limiter or a panicking worker
    /// aborts it and finalizes the task as `FAILED`.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlCounters)` - The crawl drained and the task is `SUCCESS`
    /// * `Err(LinkrotError)` - The crawl was aborted and the task is `FAILED`
    pub async fn run_crawl(&self, job: CrawlJob) -> Result<CrawlCounters> {
        // Discovered links are canonicalized the same way
        let seed_url = canonical_url(&job.seed_url);
        tracing::info!(
            "Starting crawl for task {} from {} ({} worker(s), depth limit {})",
            job.task_id,
            seed_url,
            self.workers,
            self.max_depth
        );

        self.cache.initialize(job.task_id);
        self.cache.claim(job.task_id, &seed_url);

        let processor = PageProcessor::new(
            job.task_id,
            seed_url.clone(),
            self.max_depth,
            ExcludeMatcher::new(job.exclude_patterns.iter().cloned()),
            Arc::clone(&self.cache),
        )
        .with_selector(job.selector.as_deref());

        let context = Arc::new(WorkerContext {
            scheduler: Scheduler::new([CrawlRequest::seed(seed_url)]),
            downloader: Arc::clone(&self.downloader),
            processor,
            pipeline: ResultPipeline::new(Arc::clone(&self.storage)),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers {
            let context = Arc::clone(&context);
            workers.spawn(async move { run_worker(worker_id, context).await });
        }

        let mut counters = CrawlCounters::default();
        let mut fatal: Option<LinkrotError> = None;
        while let Some(joined) = workers.join_next().await {
            let error = match joined {
                Ok((worker_counters, outcome)) => {
                    counters.merge(worker_counters);
                    match outcome {
                        Ok(()) => continue,
                        Err(e) => e,
                    }
                }
                Err(e) => LinkrotError::Worker(e.to_string()),
            };

            tracing::error!("Crawl for task {} aborted: {}", job.task_id, error);
            context.scheduler.abort();
            if fatal.is_none() {
                fatal = Some(error);
            }
        }

        let status = if fatal.is_some() {
            TaskStatus::Failed
        } else {
            TaskStatus::Success
        };
        self.finalize(job.task_id, status, counters)?;

        match fatal {
            Some(error) => Err(error),
            None => {
                tracing::info!(
                    "Crawl for task {} finished: {} checked, {} invalid",
                    job.task_id,
                    counters.total,
                    counters.invalid
                );
                Ok(counters)
            }
        }
    }

    /// The single terminal write of the task record
    fn finalize(&self, task_id: i64, status: TaskStatus, counters: CrawlCounters) -> Result<()> {
        let mut storage = self.storage.lock().unwrap_or_else(|e| e.into_inner());
        let mut task = storage.get_task(task_id)?;
        task.finish(status, counters.total, counters.invalid)?;
        storage.save_task(&task)?;
        tracing::debug!("Task {} finalized as {}", task_id, status);
        Ok(())
    }
}

/// Runs one worker until the queue drains or a step fails
///
/// The counters cover every request checked and persisted before the
/// failure, so an aborted task still reports what was written.
async fn run_worker(
    worker_id: usize,
    context: Arc<WorkerContext>,
) -> (CrawlCounters, Result<()>) {
    let mut counters = CrawlCounters::default();

    while let Some(request) = context.scheduler.next().await {
        let step = handle_request(&context, request).await;
        context.scheduler.finish();

        match step {
            Ok(Some(checked)) => counters.record(checked.status_code),
            Ok(None) => {}
            Err(e) => return (counters, Err(e)),
        }
    }

    tracing::debug!(
        "Worker {} done: {} checked, {} invalid",
        worker_id,
        counters.total,
        counters.invalid
    );
    (counters, Ok(()))
}

/// Downloads, processes and persists one request, then enqueues its children
///
/// # Returns
///
/// * `Ok(Some(request))` - The checked request, with its final status
/// * `Ok(None)` - The request was skipped
async fn handle_request(
    context: &WorkerContext,
    mut request: CrawlRequest,
) -> Result<Option<CrawlRequest>> {
    let outcome = context.downloader.fetch(&mut request).await?;
    if let FetchOutcome::Failed { reason, .. } = &outcome {
        tracing::debug!("{} failed: {}", request.url, reason);
    }

    let Some(page) = context.processor.process(&request, &outcome) else {
        return Ok(None);
    };

    context.pipeline.persist(&page)?;
    for child in page.requests {
        context.scheduler.push(child);
    }

    Ok(Some(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::RateLimiter;
    use crate::browser::{BrowserError, BrowserKind, NoopReaper, RenderSession, SessionFactory, SessionPool};
    use crate::config::CrawlerConfig;
    use crate::crawler::build_http_client;
    use crate::storage::{ResultType, SqliteStorage, Storage, StorageError, StorageResult, TaskRecord};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    type Site = Arc<HashMap<String, String>>;
    type Visits = Arc<Mutex<HashMap<String, usize>>>;

    /// Serves pages from an in-memory site map
    struct SiteSession {
        site: Site,
        visits: Visits,
        current: String,
    }

    #[async_trait]
    impl RenderSession for SiteSession {
        async fn navigate(&mut self, url: &str) -> std::result::Result<(), BrowserError> {
            *self.visits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
            self.current = url.to_string();
            Ok(())
        }

        async fn ready_state(&mut self) -> std::result::Result<String, BrowserError> {
            Ok("complete".to_string())
        }

        async fn response_status(&mut self) -> std::result::Result<Option<u16>, BrowserError> {
            Ok(Some(if self.site.contains_key(&self.current) { 200 } else { 404 }))
        }

        async fn add_cookie(&mut self, _name: &str, _value: &str) -> std::result::Result<(), BrowserError> {
            Ok(())
        }

        async fn page_source(&mut self) -> std::result::Result<String, BrowserError> {
            if self.current.contains("explode") {
                panic!("renderer crashed on {}", self.current);
            }
            Ok(self.site.get(&self.current).cloned().unwrap_or_default())
        }

        async fn quit(&mut self) -> std::result::Result<(), BrowserError> {
            Ok(())
        }
    }

    struct SiteFactory {
        site: Site,
        visits: Visits,
    }

    #[async_trait]
    impl SessionFactory for SiteFactory {
        async fn create(
            &self,
            _kind: BrowserKind,
        ) -> std::result::Result<Box<dyn RenderSession>, BrowserError> {
            Ok(Box::new(SiteSession {
                site: Arc::clone(&self.site),
                visits: Arc::clone(&self.visits),
                current: String::new(),
            }))
        }
    }

    /// SQLite storage that refuses to save results for matching URLs
    struct FlakyStorage {
        inner: SqliteStorage,
        reject: &'static str,
        task_writes: Arc<AtomicUsize>,
    }

    impl Storage for FlakyStorage {
        fn create_task(&mut self, name: &str, config: &str) -> StorageResult<i64> {
            self.inner.create_task(name, config)
        }

        fn get_task(&self, task_id: i64) -> StorageResult<TaskRecord> {
            self.inner.get_task(task_id)
        }

        fn save_task(&mut self, task: &TaskRecord) -> StorageResult<()> {
            self.task_writes.fetch_add(1, Ordering::SeqCst);
            self.inner.save_task(task)
        }

        fn save_result(&mut self, result: &LinkCheckResult) -> StorageResult<()> {
            if result.url.contains(self.reject) {
                return Err(StorageError::Database("disk full".to_string()));
            }
            self.inner.save_result(result)
        }

        fn save_results(&mut self, results: &[LinkCheckResult]) -> StorageResult<()> {
            self.inner.save_results(results)
        }

        fn results_for_task(&self, task_id: i64) -> StorageResult<Vec<LinkCheckResult>> {
            self.inner.results_for_task(task_id)
        }

        fn count_results_by_type(&self, task_id: i64) -> StorageResult<HashMap<ResultType, u64>> {
            self.inner.count_results_by_type(task_id)
        }

        fn count_invalid_results(&self, task_id: i64) -> StorageResult<u64> {
            self.inner.count_invalid_results(task_id)
        }

        fn count_external_results(&self, task_id: i64) -> StorageResult<u64> {
            self.inner.count_external_results(task_id)
        }

        fn count_distinct_urls(&self, task_id: i64) -> StorageResult<u64> {
            self.inner.count_distinct_urls(task_id)
        }

        fn get_invalid_urls(&self, task_id: i64) -> StorageResult<Vec<(String, u16, u64)>> {
            self.inner.get_invalid_urls(task_id)
        }
    }

    struct Fixture {
        coordinator: Coordinator,
        storage: SharedStorage,
        limiter: Arc<RateLimiter>,
        visits: Visits,
        task_writes: Arc<AtomicUsize>,
        task_id: i64,
    }

    fn fixture(pages: &[(&str, &str)], workers: usize, reject: &'static str) -> Fixture {
        let site: Site = Arc::new(
            pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        );
        let visits = Visits::default();
        let factory = SiteFactory {
            site,
            visits: Arc::clone(&visits),
        };
        let pool = SessionPool::new(BrowserKind::Firefox, 2, Arc::new(factory), Arc::new(NoopReaper))
            .with_timing(Duration::from_millis(100), Duration::ZERO);
        let limiter = Arc::new(RateLimiter::new(4, Duration::ZERO, Duration::ZERO));
        let downloader = Downloader::new(
            build_http_client(&CrawlerConfig::default()).unwrap(),
            Arc::new(pool),
            Arc::clone(&limiter),
        );

        let task_writes = Arc::new(AtomicUsize::new(0));
        let mut inner = SqliteStorage::new_in_memory().unwrap();
        let task_id = inner.create_task("coordinator", "{}").unwrap();
        let storage: SharedStorage = Arc::new(Mutex::new(FlakyStorage {
            inner,
            reject,
            task_writes: Arc::clone(&task_writes),
        }));

        let coordinator = Coordinator::new(
            Arc::clone(&storage),
            Arc::new(ResultCache::default()),
            Arc::new(downloader),
            workers,
            3,
        );
        Fixture {
            coordinator,
            storage,
            limiter,
            visits,
            task_writes,
            task_id,
        }
    }

    impl Fixture {
        fn task(&self) -> TaskRecord {
            self.storage.lock().unwrap().get_task(self.task_id).unwrap()
        }

        fn visits_to(&self, url: &str) -> usize {
            self.visits.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[tokio::test]
    async fn test_crawl_drains_and_succeeds() {
        let fx = fixture(
            &[
                ("https://example.com/", r#"<a href="/a">A</a><a href="/b">B</a>"#),
                ("https://example.com/a", r#"<a href="/b">B</a><a href="/gone">Gone</a>"#),
                ("https://example.com/b", r#"<a href="/">Home</a>"#),
            ],
            3,
            "never",
        );

        let counters = fx
            .coordinator
            .run_crawl(CrawlJob::new(fx.task_id, "https://example.com/"))
            .await
            .unwrap();

        assert_eq!(counters, CrawlCounters { total: 4, invalid: 1 });
        let task = fx.task();
        assert_eq!(task.status, TaskStatus::Success);
        assert_eq!(task.total_links, 4);
        assert_eq!(task.invalid_links, 1);
        assert!(task.end_time.is_some());
        assert_eq!(fx.task_writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_seed_without_trailing_slash_is_fetched_once() {
        let fx = fixture(
            &[("https://example.com/", r#"<a href="/">Home</a><a href="https://example.com">Home</a>"#)],
            2,
            "never",
        );

        let counters = fx
            .coordinator
            .run_crawl(CrawlJob::new(fx.task_id, "https://example.com"))
            .await
            .unwrap();

        assert_eq!(counters.total, 1);
        assert_eq!(fx.visits_to("https://example.com/"), 1);
        assert_eq!(fx.visits_to("https://example.com"), 0);

        let results = fx.storage.lock().unwrap().results_for_task(fx.task_id).unwrap();
        let roots = results.iter().filter(|r| r.parent_url.is_none()).count();
        assert_eq!(roots, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_task_with_partial_counters() {
        let fx = fixture(
            &[
                ("https://example.com/", r#"<a href="/a">A</a><a href="/poison">P</a><a href="/z">Z</a>"#),
                ("https://example.com/a", "<p>a</p>"),
                ("https://example.com/poison", "<p>p</p>"),
                ("https://example.com/z", "<p>z</p>"),
            ],
            1,
            "poison",
        );

        let result = fx
            .coordinator
            .run_crawl(CrawlJob::new(fx.task_id, "https://example.com/"))
            .await;
        assert!(matches!(result, Err(LinkrotError::StorageError(_))));

        let task = fx.task();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.end_time.is_some());
        // The root and /a were written before the failure
        assert_eq!(task.total_links, 2);
        assert_eq!(fx.task_writes.load(Ordering::SeqCst), 1);
        // The queue was abandoned after the failure
        assert_eq!(fx.visits_to("https://example.com/z"), 0);
    }

    #[tokio::test]
    async fn test_cancelled_limiter_fails_task() {
        let fx = fixture(&[("https://example.com/", "<p>home</p>")], 2, "never");
        fx.limiter.cancel();

        let result = fx
            .coordinator
            .run_crawl(CrawlJob::new(fx.task_id, "https://example.com/"))
            .await;
        assert!(matches!(result, Err(LinkrotError::Cancelled)));

        let task = fx.task();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.total_links, 0);
        assert!(task.end_time.is_some());
        assert_eq!(fx.visits_to("https://example.com/"), 0);
        assert_eq!(fx.task_writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_panic_fails_task() {
        let fx = fixture(
            &[
                ("https://example.com/", r#"<a href="/explode">Boom</a>"#),
                ("https://example.com/explode", "<p>never served</p>"),
            ],
            2,
            "never",
        );

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            fx.coordinator
                .run_crawl(CrawlJob::new(fx.task_id, "https://example.com/")),
        )
        .await
        .expect("remaining workers must stop after a panic");
        assert!(matches!(result, Err(LinkrotError::Worker(_))));

        let task = fx.task();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.end_time.is_some());
        assert_eq!(fx.task_writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_counters_record() {
        let mut counters = CrawlCounters::default();
        counters.record(Some(200));
        counters.record(Some(301));
        counters.record(Some(404));
        counters.record(Some(500));
        counters.record(None);
        assert_eq!(
            counters,
            CrawlCounters {
                total: 5,
                invalid: 3
            }
        );
    }

    #[test]
    fn test_counters_merge() {
        let mut a = CrawlCounters {
            total: 2,
            invalid: 1,
        };
        a.merge(CrawlCounters {
            total: 3,
            invalid: 0,
        });
        assert_eq!(a.total, 5);
        assert_eq!(a.invalid, 1);
    }

    #[test]
    fn test_job_builder() {
        let job = CrawlJob::new(3, "https://example.com/")
            .with_excludes(vec!["/private/**".to_string()])
            .with_selector(Some("main".to_string()));
        assert_eq!(job.task_id, 3);
        assert_eq!(job.exclude_patterns, vec!["/private/**"]);
        assert_eq!(job.selector.as_deref(), Some("main"));
    }
}
