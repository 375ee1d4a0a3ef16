//! Work queue for the crawl frontier
//!
//! Breadth-first FIFO shared by every worker. The queue tracks how many
//! dequeued requests are still being processed so it can tell a momentarily
//! empty frontier from a drained one: the crawl is over only when nothing is
//! queued and nothing is in flight, since an in-flight page may still emit
//! children.

use super::CrawlRequest;
use std::collections::VecDeque;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Frontier {
    queue: VecDeque<CrawlRequest>,
    in_flight: usize,
    aborted: bool,
}

/// Scheduler hands out queued requests to workers
#[derive(Debug, Default)]
pub struct Scheduler {
    frontier: Mutex<Frontier>,
    changed: Notify,
}

impl Scheduler {
    /// Creates a queue holding the given requests
    pub fn new(initial: impl IntoIterator<Item = CrawlRequest>) -> Self {
        Self {
            frontier: Mutex::new(Frontier {
                queue: initial.into_iter().collect(),
                ..Frontier::default()
            }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Frontier> {
        self.frontier.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends a request to the back of the queue
    pub fn push(&self, request: CrawlRequest) {
        self.lock().queue.push_back(request);
        self.changed.notify_waiters();
    }

    /// Waits for the next request
    ///
    /// A returned request counts as in flight until [`Scheduler::finish`] is
    /// called for it.
    ///
    /// # Returns
    ///
    /// * `Some(CrawlRequest)` - The oldest queued request
    /// * `None` - The queue is drained (empty with nothing in flight) or aborted
    pub async fn next(&self) -> Option<CrawlRequest> {
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();
            {
                let mut frontier = self.lock();
                if frontier.aborted {
                    return None;
                }
                if let Some(request) = frontier.queue.pop_front() {
                    frontier.in_flight += 1;
                    return Some(request);
                }
                if frontier.in_flight == 0 {
                    drop(frontier);
                    // Wake idle workers so they observe the drain too
                    self.changed.notify_waiters();
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Marks one dequeued request as fully processed
    ///
    /// Must be called after every child of that request has been pushed.
    pub fn finish(&self) {
        {
            let mut frontier = self.lock();
            frontier.in_flight = frontier.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Stops handing out work; queued requests are discarded
    pub fn abort(&self) {
        {
            let mut frontier = self.lock();
            frontier.aborted = true;
            frontier.queue.clear();
        }
        self.changed.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.lock().aborted
    }

    /// Number of queued requests
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Number of dequeued requests not yet finished
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }
}
