//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test the full
//! crawl cycle end-to-end. Rendering sessions are replaced by a session that
//! loads pages with a plain HTTP client and records every navigation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use sumi_linkrot::browser::{BrowserError, BrowserKind, NoopReaper, RenderSession, SessionFactory};
use sumi_linkrot::config::Config;
use sumi_linkrot::crawler::{CrawlJob, LinkCheckService};
use sumi_linkrot::storage::{LinkCheckResult, ResultType, SharedStorage, SqliteStorage};
use sumi_linkrot::TaskStatus;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Navigations = Arc<Mutex<HashMap<String, usize>>>;

/// Renders pages by fetching them over HTTP
struct HttpSession {
    client: reqwest::Client,
    navigations: Navigations,
    status: Option<u16>,
    body: String,
}

#[async_trait]
impl RenderSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        *self
            .navigations
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BrowserError::Session(e.to_string()))?;
        self.status = Some(response.status().as_u16());
        self.body = response.text().await.unwrap_or_default();
        Ok(())
    }

    async fn ready_state(&mut self) -> Result<String, BrowserError> {
        Ok("complete".to_string())
    }

    async fn response_status(&mut self) -> Result<Option<u16>, BrowserError> {
        Ok(self.status)
    }

    async fn add_cookie(&mut self, _name: &str, _value: &str) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.body.clone())
    }

    async fn quit(&mut self) -> Result<(), BrowserError> {
        Ok(())
    }
}

#[derive(Default)]
struct HttpSessionFactory {
    navigations: Navigations,
}

#[async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn create(&self, _kind: BrowserKind) -> Result<Box<dyn RenderSession>, BrowserError> {
        Ok(Box::new(HttpSession {
            client: reqwest::Client::new(),
            navigations: Arc::clone(&self.navigations),
            status: None,
            body: String::new(),
        }))
    }
}

struct Harness {
    service: LinkCheckService,
    storage: SharedStorage,
    navigations: Navigations,
    _dir: TempDir,
}

impl Harness {
    fn new(max_depth: u32) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = dir.path().join("linkrot.db");

        let mut config = Config::default();
        config.crawler.max_depth = max_depth;
        config.crawler.workers = 4;
        config.crawler.request_timeout_ms = 2_000;
        config.browser.pool_capacity = 2;
        config.browser.ready_timeout_ms = 200;
        config.browser.settle_delay_ms = 0;
        config.rate_limit.base_delay_ms = 0;
        config.rate_limit.jitter_ms = 0;
        config.rate_limit.backoff_base_ms = 10;
        config.rate_limit.backoff_cap_ms = 50;
        config.output.database_path = db_path.display().to_string();

        let sqlite = SqliteStorage::new(&db_path).expect("Failed to open DB");
        let storage: SharedStorage = Arc::new(Mutex::new(sqlite));
        let factory = Arc::new(HttpSessionFactory::default());
        let navigations = Arc::clone(&factory.navigations);

        let service = LinkCheckService::new(
            config,
            Arc::clone(&storage),
            factory,
            Arc::new(NoopReaper),
        )
        .expect("Failed to build service");

        Self {
            service,
            storage,
            navigations,
            _dir: dir,
        }
    }

    async fn crawl(&self, seed: &str, excludes: &[&str]) -> sumi_linkrot::Result<(i64, sumi_linkrot::CrawlCounters)> {
        let task_id = self
            .service
            .create_task("integration", &serde_json::json!({ "seedUrl": seed }))?;
        let job = CrawlJob::new(task_id, seed)
            .with_excludes(excludes.iter().map(|p| p.to_string()).collect());
        let counters = self
            .service
            .start_crawl(job)
            .await
            .expect("Crawl task panicked")?;
        Ok((task_id, counters))
    }

    fn results(&self, task_id: i64) -> Vec<LinkCheckResult> {
        self.storage
            .lock()
            .unwrap()
            .results_for_task(task_id)
            .expect("Failed to load results")
    }

    fn navigations_to(&self, url: &str) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn find<'a>(results: &'a [LinkCheckResult], url: &str) -> Option<&'a LinkCheckResult> {
    results.iter().find(|r| r.url == url)
}

#[tokio::test]
async fn test_crawl_page_with_internal_external_and_image() {
    let site = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    let root = format!("{}/", site.uri());
    // Same machine, different host name
    let external = format!("http://localhost:{}/", elsewhere.address().port());

    mount_page(
        &site,
        "/",
        format!(
            r#"<html><body>
            <a href="/about">About</a>
            <a href="{}">Elsewhere</a>
            <img src="/logo.png">
            </body></html>"#,
            external
        ),
    )
    .await;
    mount_page(
        &site,
        "/about",
        r#"<html><body><a href="/deeper">Too deep</a></body></html>"#.to_string(),
    )
    .await;
    mount_page(&elsewhere, "/", "<html><body>Hi</body></html>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 8]))
        .expect(1)
        .mount(&site)
        .await;

    let harness = Harness::new(2);
    let (task_id, counters) = harness.crawl(&root, &[]).await.expect("Crawl failed");

    assert_eq!(counters.total, 4);
    assert_eq!(counters.invalid, 0);

    let results = harness.results(task_id);
    assert_eq!(results.len(), 4, "unexpected results: {:?}", results);

    let root_result = find(&results, &root).expect("root result");
    assert_eq!(root_result.result_type, ResultType::Link);
    assert!(!root_result.external);
    assert_eq!(root_result.parent_url, None);

    let about = find(&results, &format!("{}about", root)).expect("internal result");
    assert_eq!(about.result_type, ResultType::Link);
    assert!(!about.external);
    assert_eq!(about.parent_url.as_deref(), Some(root.as_str()));

    let external_result = find(&results, &external).expect("external result");
    assert_eq!(external_result.result_type, ResultType::Link);
    assert!(external_result.external);

    let logo = find(&results, &format!("{}logo.png", root)).expect("image result");
    assert_eq!(logo.result_type, ResultType::Source);
    assert!(logo.valid);

    // The internal child sits at the depth limit: nothing below it is fetched
    assert_eq!(harness.navigations_to(&format!("{}deeper", root)), 0);
    assert!(find(&results, &format!("{}deeper", root)).is_none());

    let task = harness.storage.lock().unwrap().get_task(task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    assert_eq!(task.total_links, 4);
    assert_eq!(task.invalid_links, 0);
    assert!(task.end_time.is_some());
}

#[tokio::test]
async fn test_invalid_results_are_counted() {
    let site = MockServer::start().await;
    let root = format!("{}/", site.uri());

    mount_page(
        &site,
        "/",
        r#"<a href="/missing">Gone</a><img src="/broken.png"><script src="http://127.0.0.1:9/app.js"></script>"#
            .to_string(),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site)
        .await;

    let harness = Harness::new(2);
    let (task_id, counters) = harness.crawl(&root, &[]).await.expect("Crawl failed");

    assert_eq!(counters.total, 4);
    assert_eq!(counters.invalid, 3);

    let results = harness.results(task_id);
    let missing = find(&results, &format!("{}missing", root)).unwrap();
    assert_eq!(missing.response_status, 404);
    assert!(!missing.valid);

    // Connection refused is recorded as a synthetic 500
    let unreachable = find(&results, "http://127.0.0.1:9/app.js").unwrap();
    assert_eq!(unreachable.response_status, 500);
    assert!(!unreachable.valid);

    let task = harness.storage.lock().unwrap().get_task(task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    assert_eq!(task.invalid_links, 3);
}

#[tokio::test]
async fn test_each_url_fetched_once() {
    let site = MockServer::start().await;
    let root = format!("{}/", site.uri());

    mount_page(
        &site,
        "/",
        r#"<a href="/a">A</a><a href="/b">B</a><img src="/logo.png">"#.to_string(),
    )
    .await;
    mount_page(
        &site,
        "/a",
        r#"<a href="/">Home</a><a href="/b">B</a><img src="/logo.png">"#.to_string(),
    )
    .await;
    mount_page(
        &site,
        "/b",
        r#"<a href="/a">A</a><a href="/c">C</a><img src="/logo.png">"#.to_string(),
    )
    .await;
    mount_page(&site, "/c", r#"<a href="/">Home</a>"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&site)
        .await;

    let harness = Harness::new(3);
    let (task_id, counters) = harness.crawl(&root, &[]).await.expect("Crawl failed");

    // /, /a, /b, /logo.png, /c
    assert_eq!(counters.total, 5);
    for page in ["", "a", "b", "c"] {
        assert_eq!(
            harness.navigations_to(&format!("{}{}", root, page)),
            1,
            "page /{} fetched more than once",
            page
        );
    }

    let results = harness.results(task_id);
    let checked: Vec<_> = results.iter().filter(|r| r.parent_url.is_none()).collect();
    assert_eq!(checked.len(), 1);

    // Every row points at a page that referenced it one level up
    for result in &results {
        if let Some(parent) = &result.parent_url {
            assert!(parent.starts_with(&root));
        }
    }
}

#[tokio::test]
async fn test_cached_results_attach_to_every_referencing_page() {
    let site = MockServer::start().await;
    let root = format!("{}/", site.uri());

    mount_page(&site, "/", r#"<img src="/logo.png"><a href="/a">A</a>"#.to_string()).await;
    mount_page(&site, "/a", r#"<img src="/logo.png">"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&site)
        .await;

    let harness = Harness::new(3);
    let (task_id, _) = harness.crawl(&root, &[]).await.expect("Crawl failed");

    let logo_url = format!("{}logo.png", root);
    let logo_rows: Vec<_> = harness
        .results(task_id)
        .into_iter()
        .filter(|r| r.url == logo_url)
        .collect();

    // One row from the root; one more only if /a was processed after the image
    assert!(!logo_rows.is_empty() && logo_rows.len() <= 2);
    assert!(logo_rows
        .iter()
        .any(|r| r.parent_url.as_deref() == Some(root.as_str())));
}

#[tokio::test]
async fn test_seed_without_trailing_slash_is_checked_once() {
    let site = MockServer::start().await;
    let root = format!("{}/", site.uri());
    mount_page(&site, "/", r#"<a href="/">Home</a><a href="/a">A</a>"#.to_string()).await;
    mount_page(&site, "/a", r#"<a href="/">Home</a>"#.to_string()).await;

    let harness = Harness::new(3);
    let (task_id, counters) = harness.crawl(&site.uri(), &[]).await.expect("Crawl failed");

    assert_eq!(counters.total, 2);
    assert_eq!(harness.navigations_to(&root), 1);
    assert_eq!(harness.navigations_to(&site.uri()), 0);

    let results = harness.results(task_id);
    let seed_rows: Vec<_> = results.iter().filter(|r| r.parent_url.is_none()).collect();
    assert_eq!(seed_rows.len(), 1);
    assert_eq!(seed_rows[0].url, root);
}

#[tokio::test]
async fn test_excluded_links_are_not_crawled() {
    let site = MockServer::start().await;
    let root = format!("{}/", site.uri());

    mount_page(
        &site,
        "/",
        r#"<a href="/private/secret">Secret</a><a href="/public">Public</a>"#.to_string(),
    )
    .await;
    mount_page(&site, "/public", "<p>ok</p>".to_string()).await;
    mount_page(&site, "/private/secret", "<p>hidden</p>".to_string()).await;

    let harness = Harness::new(2);
    let (task_id, counters) = harness
        .crawl(&root, &["/private/**"])
        .await
        .expect("Crawl failed");

    assert_eq!(counters.total, 2);
    let results = harness.results(task_id);
    assert!(find(&results, &format!("{}public", root)).is_some());
    assert!(find(&results, &format!("{}private/secret", root)).is_none());
    assert_eq!(harness.navigations_to(&format!("{}private/secret", root)), 0);
}

#[tokio::test]
async fn test_second_task_rechecks_every_url() {
    let site = MockServer::start().await;
    let root = format!("{}/", site.uri());
    mount_page(&site, "/", r#"<a href="/a">A</a>"#.to_string()).await;
    mount_page(&site, "/a", "<p>a</p>".to_string()).await;

    let harness = Harness::new(2);
    let (first, counters) = harness.crawl(&root, &[]).await.expect("Crawl failed");
    assert_eq!(counters.total, 2);

    let (second, counters) = harness.crawl(&root, &[]).await.expect("Crawl failed");
    assert_ne!(first, second);
    assert_eq!(counters.total, 2);
    assert_eq!(harness.navigations_to(&format!("{}a", root)), 2);
}

#[tokio::test]
async fn test_crawl_after_shutdown_records_failures() {
    let site = MockServer::start().await;
    let root = format!("{}/", site.uri());
    mount_page(&site, "/", "<p>never rendered</p>".to_string()).await;

    let harness = Harness::new(2);
    harness.service.shutdown().await.expect("First shutdown");
    assert!(harness.service.shutdown().await.is_err());

    let (task_id, counters) = harness.crawl(&root, &[]).await.expect("Crawl failed");
    assert_eq!(counters.total, 1);
    assert_eq!(counters.invalid, 1);

    let results = harness.results(task_id);
    assert_eq!(results[0].response_status, 500);
    assert_eq!(harness.navigations_to(&root), 0);
}

#[tokio::test]
async fn test_validator_retries_forbidden_with_get() {
    let site = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&site)
        .await;

    let harness = Harness::new(2);
    let validator = harness.service.validator().expect("validator");
    let result = validator
        .validate(&format!("{}/guarded", site.uri()))
        .await
        .expect("validation");

    assert!(result.valid);
    assert_eq!(result.status_code, 200);
    assert_eq!(result.error_message, None);
}

#[tokio::test]
async fn test_validator_keeps_repeated_forbidden_status() {
    let site = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&site)
        .await;

    let harness = Harness::new(2);
    let result = harness
        .service
        .validator()
        .expect("validator")
        .validate(&site.uri())
        .await
        .expect("validation");

    assert!(!result.valid);
    assert_eq!(result.status_code, 403);
    assert_eq!(result.error_message, None);
}
