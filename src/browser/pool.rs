//! Bounded pool of rendering sessions
//!
//! Sessions are created lazily up to `capacity` and reused indefinitely.
//! A semaphore with `capacity` permits bounds the number of sessions that
//! are checked out at once, so creation never exceeds capacity either: a
//! new session is only built when no idle one exists, which can only happen
//! while fewer than `capacity` are alive.
//!
//! Shutdown is a one-way transition. It closes the semaphore so blocked and
//! future checkouts fail fast, waits for in-flight sessions to come back,
//! quits every session and finally runs the process reaper.

use super::{BrowserError, BrowserKind, ProcessReaper, RenderSession, SessionFactory};
use std::collections::BTreeMap;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore, SemaphorePermit};
use tokio::time::{sleep, Instant};

/// Interval between `document.readyState` polls
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Status reported when the browser does not expose the navigation status
const DEFAULT_RENDER_STATUS: u16 = 200;

/// Fully rendered document
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub status: u16,
    pub html: String,
}

#[derive(Default)]
struct PoolInner {
    idle: Vec<Box<dyn RenderSession>>,
    /// Sessions alive (idle + checked out + being created)
    created: usize,
    closed: bool,
}

/// Bounded pool of rendering sessions
pub struct SessionPool {
    kind: BrowserKind,
    capacity: usize,
    ready_timeout: Duration,
    settle_delay: Duration,
    factory: Arc<dyn SessionFactory>,
    reaper: Arc<dyn ProcessReaper>,
    permits: Semaphore,
    inner: Mutex<PoolInner>,
    returned: Notify,
}

/// A checked-out session, returned to the pool when dropped
pub struct PooledSession<'a> {
    pool: &'a SessionPool,
    session: Option<Box<dyn RenderSession>>,
    _permit: SemaphorePermit<'a>,
}

impl PooledSession<'_> {
    pub fn session_mut(&mut self) -> Result<&mut dyn RenderSession, BrowserError> {
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(BrowserError::Session("session already returned".to_string())),
        }
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.give_back(session);
        }
    }
}

/// Slot counted in `created` while a session is being built
///
/// Released on drop unless kept, so a failed or abandoned creation never
/// leaves a phantom session for shutdown to wait on.
struct Reservation<'a> {
    pool: &'a SessionPool,
    armed: bool,
}

impl Reservation<'_> {
    fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pool.lock().created -= 1;
            self.pool.returned.notify_waiters();
        }
    }
}

impl SessionPool {
    /// Creates an empty pool
    ///
    /// # Arguments
    ///
    /// * `kind` - Browser flavour used for every session
    /// * `capacity` - Maximum number of live sessions (at least 1)
    /// * `factory` - Builds new sessions on demand
    /// * `reaper` - Cleans up orphaned driver processes on shutdown
    pub fn new(
        kind: BrowserKind,
        capacity: usize,
        factory: Arc<dyn SessionFactory>,
        reaper: Arc<dyn ProcessReaper>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            kind,
            capacity,
            ready_timeout: Duration::from_secs(5),
            settle_delay: Duration::ZERO,
            factory,
            reaper,
            permits: Semaphore::new(capacity),
            inner: Mutex::new(PoolInner::default()),
            returned: Notify::new(),
        }
    }

    /// Sets the bounded document-ready wait and the fixed settle delay
    pub fn with_timing(mut self, ready_timeout: Duration, settle_delay: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self.settle_delay = settle_delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of sessions created and not yet torn down
    pub fn created(&self) -> usize {
        self.lock().created
    }

    pub fn idle(&self) -> usize {
        self.lock().idle.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Checks out a session, creating one if under capacity
    ///
    /// Blocks while every session is in use. Fails with
    /// `BrowserError::PoolClosed` once shutdown has started, including for
    /// callers that were already blocked.
    pub async fn checkout(&self) -> Result<PooledSession<'_>, BrowserError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| BrowserError::PoolClosed)?;

        let idle = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(BrowserError::PoolClosed);
            }
            let idle = inner.idle.pop();
            if idle.is_none() {
                inner.created += 1;
            }
            idle
        };

        let session = match idle {
            Some(session) => session,
            None => {
                let reservation = Reservation { pool: self, armed: true };
                let session = self.factory.create(self.kind).await?;
                reservation.keep();
                tracing::debug!("Created {} session ({}/{})", self.kind, self.created(), self.capacity);
                session
            }
        };

        Ok(PooledSession {
            pool: self,
            session: Some(session),
            _permit: permit,
        })
    }

    fn give_back(&self, session: Box<dyn RenderSession>) {
        self.lock().idle.push(session);
        self.returned.notify_waiters();
    }

    /// Renders a page in a pooled session
    ///
    /// Navigates, waits (bounded) for `document.readyState == "complete"`,
    /// sleeps the settle delay, propagates cookies and returns the rendered
    /// DOM. The session goes back to the pool on every path.
    ///
    /// # Arguments
    ///
    /// * `url` - Page to render
    /// * `cookies` - Cookies set on the session after navigation
    pub async fn render_page(
        &self,
        url: &str,
        cookies: &BTreeMap<String, String>,
    ) -> Result<RenderedPage, BrowserError> {
        let mut pooled = self.checkout().await?;
        let session = pooled.session_mut()?;

        session.navigate(url).await?;

        if !wait_until_ready(session, self.ready_timeout).await {
            tracing::debug!("Document not ready within {:?}: {}", self.ready_timeout, url);
        }

        let status = match session.response_status().await {
            Ok(Some(code)) if code > 0 => code,
            Ok(_) => DEFAULT_RENDER_STATUS,
            Err(e) => {
                tracing::debug!("Navigation status unavailable for {}: {}", url, e);
                DEFAULT_RENDER_STATUS
            }
        };

        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }

        for (name, value) in cookies {
            session.add_cookie(name, value).await?;
        }

        let html = session.page_source().await?;
        Ok(RenderedPage { status, html })
    }

    /// Tears the pool down
    ///
    /// # Returns
    ///
    /// * `Ok(n)` - Number of sessions that were quit
    /// * `Err(BrowserError::AlreadyShutDown)` - Shutdown was already requested
    pub async fn shutdown_all(&self) -> Result<usize, BrowserError> {
        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(BrowserError::AlreadyShutDown);
            }
            inner.closed = true;
        }
        self.permits.close();
        tracing::info!("Shutting down session pool");

        // Drain: every live session must be idle before teardown
        loop {
            let mut notified = pin!(self.returned.notified());
            notified.as_mut().enable();
            {
                let inner = self.lock();
                if inner.idle.len() >= inner.created {
                    break;
                }
                tracing::debug!(
                    "Waiting for {} session(s) to be returned",
                    inner.created - inner.idle.len()
                );
            }
            notified.await;
        }

        let sessions = std::mem::take(&mut self.lock().idle);
        let count = sessions.len();
        for mut session in sessions {
            if let Err(e) = session.quit().await {
                tracing::warn!("Failed to quit session: {}", e);
            }
        }
        self.lock().created = 0;
        self.factory.close().await;

        if let Err(e) = self.reaper.reap().await {
            tracing::warn!("Orphaned driver cleanup failed: {}", e);
        }

        tracing::info!("Session pool shut down ({} session(s) quit)", count);
        Ok(count)
    }
}

/// Polls `document.readyState` until complete or the deadline passes
async fn wait_until_ready(session: &mut dyn RenderSession, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match session.ready_state().await {
            Ok(state) if state == "complete" => return true,
            Ok(_) => {}
            Err(e) => tracing::debug!("readyState poll failed: {}", e),
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(READY_POLL_INTERVAL).await;
    }
}
