use crate::state::ContentKind;
use chrono::{DateTime, Utc};

/// Depth assigned to the seed request
pub const SEED_DEPTH: u32 = 1;

/// One unit of traversal work
///
/// Owned by the work queue until a worker dequeues it, then by that worker
/// alone.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRequest {
    pub url: String,
    /// Page that discovered this URL; `None` only for the seed
    pub parent_url: Option<String>,
    pub depth: u32,
    pub kind: ContentKind,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status_code: Option<u16>,
}

impl CrawlRequest {
    /// Root request of a crawl: depth 1, fetched as a page
    pub fn seed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            parent_url: None,
            depth: SEED_DEPTH,
            kind: ContentKind::Html,
            started_at: None,
            finished_at: None,
            status_code: None,
        }
    }

    /// Request for a URL discovered on this request's page
    pub fn child(&self, url: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            url: url.into(),
            parent_url: Some(self.url.clone()),
            depth: self.depth + 1,
            kind,
            started_at: None,
            finished_at: None,
            status_code: None,
        }
    }

    pub fn mark_started(&mut self) {
        self.started_at = Some(Utc::now());
        self.finished_at = None;
    }

    pub fn mark_finished(&mut self, status_code: Option<u16>) {
        self.finished_at = Some(Utc::now());
        self.status_code = status_code;
    }

    /// Milliseconds between start and finish, `-1` if either is missing
    pub fn duration_ms(&self) -> i64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds().max(0),
            _ => -1,
        }
    }
}
