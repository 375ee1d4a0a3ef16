//! Page processing
//!
//! Turns a fetched request into its result record and, while the page is
//! within the depth budget, into the follow-up requests for every link and
//! resource it references.
//!
//! Processing is synchronous: HTML parsing happens entirely inside
//! [`PageProcessor::process`] and nothing parsed outlives the call.

use super::{CrawlRequest, FetchOutcome};
use crate::cache::ResultCache;
use crate::state::ContentKind;
use crate::storage::{LinkCheckResult, ResultType};
use crate::url::{
    canonical_url, extract_script_urls, extract_style_urls, is_absolute_url, is_external,
    is_page_link, is_valid, to_absolute, ExcludeMatcher,
};
use chrono::Utc;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| parse_static("a[href]"));
static LINK: LazyLock<Selector> = LazyLock::new(|| parse_static("link[href]"));
static SRC: LazyLock<Selector> =
    LazyLock::new(|| parse_static("script[src], img[src], video[src], source[src]"));
static STYLE: LazyLock<Selector> = LazyLock::new(|| parse_static("style"));
static SCRIPT: LazyLock<Selector> = LazyLock::new(|| parse_static("script"));

fn parse_static(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// Everything produced from one fetched request
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedPage {
    /// Result for the fetched URL itself
    pub result: LinkCheckResult,
    /// Cached results re-attached to this page as their parent
    pub attached: Vec<LinkCheckResult>,
    /// Newly claimed requests, one depth below this page
    pub requests: Vec<CrawlRequest>,
}

/// Links found on a page, absolute and de-duplicated
#[derive(Debug, Default, PartialEq)]
struct ExtractedLinks {
    pages: BTreeSet<String>,
    resources: BTreeSet<String>,
}

/// Per-crawl page processor
pub struct PageProcessor {
    task_id: i64,
    base_url: String,
    max_depth: u32,
    excludes: ExcludeMatcher,
    selector: Option<Selector>,
    cache: Arc<ResultCache>,
}

impl PageProcessor {
    /// Creates a processor for one crawl task
    ///
    /// # Arguments
    ///
    /// * `task_id` - Cache namespace and result owner
    /// * `base_url` - Seed URL; external links are judged against its host
    /// * `max_depth` - Links are extracted only from pages shallower than this
    /// * `excludes` - Patterns whose matches are never enqueued
    /// * `cache` - Shared result cache
    pub fn new(
        task_id: i64,
        base_url: impl Into<String>,
        max_depth: u32,
        excludes: ExcludeMatcher,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            task_id,
            base_url: base_url.into(),
            max_depth,
            excludes,
            selector: None,
            cache,
        }
    }

    /// Sets the CSS selector whose matches are stored with each page result
    ///
    /// An unparsable selector is logged and disables extraction.
    pub fn with_selector(mut self, selector: Option<&str>) -> Self {
        self.selector = selector
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|css| match Selector::parse(css) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    tracing::warn!("Ignoring invalid content selector '{}': {:?}", css, e);
                    None
                }
            });
        self
    }

    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    /// Processes one fetched request
    ///
    /// # Returns
    ///
    /// * `Some(ProcessedPage)` - The page's result, re-attached cached results
    ///   and the requests to enqueue
    /// * `None` - The page itself matches an exclusion pattern and is skipped
    pub fn process(&self, request: &CrawlRequest, outcome: &FetchOutcome) -> Option<ProcessedPage> {
        if self.excludes.is_excluded(&request.url) {
            tracing::debug!("Skipping excluded page {}", request.url);
            return None;
        }

        let status = outcome.status();
        let valid = LinkCheckResult::is_valid_status(status);
        let html = request.kind.is_html();
        let document = match outcome.content() {
            Some(content) if html && valid => Some(Html::parse_document(content)),
            _ => None,
        };

        let mut result = LinkCheckResult {
            task_id: self.task_id,
            url: request.url.clone(),
            parent_url: request.parent_url.clone(),
            result_type: if html {
                ResultType::Link
            } else {
                ResultType::Source
            },
            external: is_external(&self.base_url, &request.url),
            response_status: status,
            valid,
            extracted_data: None,
            check_time: request.started_at.unwrap_or_else(Utc::now),
            check_duration_ms: request.duration_ms(),
        };

        if let (Some(document), Some(selector)) = (&document, &self.selector) {
            result.extracted_data = extract_content(document, selector);
            if result.extracted_data.is_none() {
                tracing::debug!("Content selector matched nothing on {}", request.url);
            }
        }

        self.cache.put(self.task_id, result.clone());
        self.cache.put_global(result.clone());

        let mut processed = ProcessedPage {
            result,
            attached: Vec::new(),
            requests: Vec::new(),
        };

        let document = match document {
            Some(document) if request.depth < self.max_depth => document,
            _ => return Some(processed),
        };

        let links = extract_links(&document, &request.url);
        drop(document);

        let candidates = links
            .pages
            .iter()
            .map(|url| (url, ContentKind::Html))
            .chain(links.resources.iter().map(|url| (url, ContentKind::Other)));

        for (url, kind) in candidates {
            if let Some(cached) = self.cache.get(self.task_id, url) {
                processed.attached.push(cached.with_parent(&request.url));
            }

            if self.excludes.is_excluded(url) {
                tracing::debug!("Excluded {}", url);
                continue;
            }

            if self.cache.claim(self.task_id, url) {
                processed.requests.push(request.child(url.as_str(), kind));
            }
        }

        tracing::debug!(
            "{} at depth {}: {} page(s), {} resource(s), {} new request(s)",
            request.url,
            request.depth,
            links.pages.len(),
            links.resources.len(),
            processed.requests.len()
        );
        Some(processed)
    }
}

/// Outer HTML of every element matching the selector, newline-joined
fn extract_content(document: &Html, selector: &Selector) -> Option<String> {
    let matches: Vec<String> = document.select(selector).map(|el| el.html()).collect();
    if matches.is_empty() {
        None
    } else {
        Some(matches.join("\n"))
    }
}

/// Collects every link and resource referenced by a document
///
/// Anchors are split into pages and resources by [`is_page_link`]; all other
/// references are resources. Values are resolved against `page_url`.
fn extract_links(document: &Html, page_url: &str) -> ExtractedLinks {
    let mut links = ExtractedLinks::default();
    let resolve = |raw: &str| -> Option<String> {
        if !is_valid(raw) {
            return None;
        }
        let absolute = canonical_url(&to_absolute(page_url, raw));
        is_absolute_url(&absolute).then_some(absolute)
    };

    for href in document.select(&ANCHOR).filter_map(|el| el.value().attr("href")) {
        if let Some(url) = resolve(href) {
            if is_page_link(&url) {
                links.pages.insert(url);
            } else {
                links.resources.insert(url);
            }
        }
    }

    let attributes = document
        .select(&LINK)
        .filter_map(|el| el.value().attr("href"))
        .chain(document.select(&SRC).filter_map(|el| el.value().attr("src")));
    links.resources.extend(attributes.filter_map(resolve));

    for style in document.select(&STYLE) {
        let text: String = style.text().collect();
        links
            .resources
            .extend(extract_style_urls(&text).iter().filter_map(|u| resolve(u.as_str())));
    }

    for script in document.select(&SCRIPT) {
        let text: String = script.text().collect();
        links
            .resources
            .extend(extract_script_urls(&text).iter().filter_map(|u| resolve(u.as_str())));
    }

    links
}
