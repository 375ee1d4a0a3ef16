//! Two-level result cache
//!
//! Results are cached per task (one namespace per crawl task) and in a
//! global namespace holding the last known result for every URL across
//! tasks. The per-task namespace doubles as the crawl's visited set: a URL
//! is claimed with a pending marker when it is first enqueued and the
//! marker is replaced by the finished result once the page is processed.
//!
//! Both levels are bounded LRU maps with expire-after-access semantics.

use crate::config::CacheConfig;
use crate::storage::LinkCheckResult;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// State of a URL within a task namespace
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    /// Enqueued but not processed yet
    Pending,
    /// Processed, holding the canonical result
    Checked(LinkCheckResult),
}

#[derive(Debug)]
struct Timed<V> {
    value: V,
    last_access: Instant,
}

impl<V> Timed<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            last_access: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.last_access) >= ttl
    }
}

#[derive(Debug)]
struct TaskNamespace {
    entries: LruCache<String, Timed<CacheEntry>>,
    last_access: Instant,
}

impl TaskNamespace {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            last_access: Instant::now(),
        }
    }
}

#[derive(Debug)]
struct CacheState {
    tasks: LruCache<i64, TaskNamespace>,
    global: LruCache<String, Timed<LinkCheckResult>>,
}

/// Thread-safe two-level result cache
#[derive(Debug)]
pub struct ResultCache {
    state: Mutex<CacheState>,
    task_ttl: Duration,
    task_capacity: NonZeroUsize,
    entry_ttl: Duration,
    global_ttl: Duration,
}

fn non_zero(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl ResultCache {
    /// Creates a cache sized from configuration
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(
            config.max_tasks,
            Duration::from_secs(config.task_ttl_secs),
            config.task_capacity,
            Duration::from_secs(config.entry_ttl_secs),
            config.global_capacity,
            Duration::from_secs(config.global_ttl_secs),
        )
    }

    fn with_limits(
        max_tasks: usize,
        task_ttl: Duration,
        task_capacity: usize,
        entry_ttl: Duration,
        global_capacity: usize,
        global_ttl: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(CacheState {
                tasks: LruCache::new(non_zero(max_tasks)),
                global: LruCache::new(non_zero(global_capacity)),
            }),
            task_ttl,
            task_capacity: non_zero(task_capacity),
            entry_ttl,
            global_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the live namespace for a task, creating it when missing or expired
    fn namespace<'a>(&self, state: &'a mut CacheState, task_id: i64) -> &'a mut TaskNamespace {
        let now = Instant::now();
        let expired = state
            .tasks
            .peek(&task_id)
            .map(|ns| now.duration_since(ns.last_access) >= self.task_ttl)
            .unwrap_or(false);

        if expired {
            state.tasks.pop(&task_id);
        }

        let ns = state
            .tasks
            .get_or_insert_mut(task_id, || TaskNamespace::new(self.task_capacity));
        ns.last_access = now;
        ns
    }

    /// Looks up a live entry, dropping it if it has expired
    fn live_entry<'a>(
        &self,
        ns: &'a mut TaskNamespace,
        url: &str,
    ) -> Option<&'a mut Timed<CacheEntry>> {
        let now = Instant::now();
        let expired = ns.entries.peek(url)?.is_expired(self.entry_ttl, now);
        if expired {
            ns.entries.pop(url);
            return None;
        }

        let entry = ns.entries.get_mut(url)?;
        entry.last_access = now;
        Some(entry)
    }

    /// Creates or wipes the namespace for a task
    ///
    /// Calling this twice for the same task discards everything the first
    /// run recorded, including pending claims.
    pub fn initialize(&self, task_id: i64) {
        let mut state = self.lock();
        state.tasks.put(task_id, TaskNamespace::new(self.task_capacity));
    }

    /// Atomically claims a URL for fetching within a task
    ///
    /// Returns true if the URL was absent and is now marked pending; false
    /// if it was already pending or checked. Exactly one caller wins for
    /// any given URL.
    pub fn claim(&self, task_id: i64, url: &str) -> bool {
        let mut state = self.lock();
        let ns = self.namespace(&mut state, task_id);
        if self.live_entry(ns, url).is_some() {
            return false;
        }
        ns.entries
            .put(url.to_string(), Timed::new(CacheEntry::Pending));
        true
    }

    /// Returns true if the URL is pending or checked within a task
    pub fn contains(&self, task_id: i64, url: &str) -> bool {
        let mut state = self.lock();
        let ns = self.namespace(&mut state, task_id);
        self.live_entry(ns, url).is_some()
    }

    /// Stores the finished result for its URL, replacing any pending claim
    pub fn put(&self, task_id: i64, result: LinkCheckResult) {
        let mut state = self.lock();
        let ns = self.namespace(&mut state, task_id);
        ns.entries
            .put(result.url.clone(), Timed::new(CacheEntry::Checked(result)));
    }

    /// Returns the checked result for a URL within a task
    ///
    /// Pending claims are not returned.
    pub fn get(&self, task_id: i64, url: &str) -> Option<LinkCheckResult> {
        let mut state = self.lock();
        let ns = self.namespace(&mut state, task_id);
        match &self.live_entry(ns, url)?.value {
            CacheEntry::Checked(result) => Some(result.clone()),
            CacheEntry::Pending => None,
        }
    }

    /// Number of live entries (pending included) in a task namespace
    pub fn len(&self, task_id: i64) -> usize {
        let state = self.lock();
        state
            .tasks
            .peek(&task_id)
            .map(|ns| ns.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, task_id: i64) -> bool {
        self.len(task_id) == 0
    }

    /// Publishes a result to the global namespace
    pub fn put_global(&self, result: LinkCheckResult) {
        let mut state = self.lock();
        state.global.put(result.url.clone(), Timed::new(result));
    }

    /// Returns the last result recorded for a URL by any task
    pub fn get_global(&self, url: &str) -> Option<LinkCheckResult> {
        let mut state = self.lock();
        let now = Instant::now();
        let expired = state.global.peek(url)?.is_expired(self.global_ttl, now);
        if expired {
            state.global.pop(url);
            return None;
        }

        let entry = state.global.get_mut(url)?;
        entry.last_access = now;
        Some(entry.value.clone())
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
