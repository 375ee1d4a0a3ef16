//! Outbound request pacing
//!
//! A counting semaphore caps the number of requests in flight against the
//! target site. Every granted permit is additionally delayed by a randomized
//! pacing sleep, so the request rate stays throttled even when permits are
//! plentiful.

use crate::config::RateLimitConfig;
use crate::{LinkrotError, Result};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

/// A granted rate-limit permit; released when dropped
#[derive(Debug)]
pub struct RatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Concurrency ceiling plus pacing delay and retry backoff schedule
#[derive(Debug)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
    ceiling: usize,
    base_delay: Duration,
    jitter: Duration,
    backoff_base: Duration,
    backoff_cap: Duration,
    cancel: watch::Sender<bool>,
}

impl RateLimiter {
    /// Creates a limiter
    ///
    /// # Arguments
    ///
    /// * `ceiling` - Maximum number of simultaneously held permits (at least 1)
    /// * `base_delay` - Fixed part of the pacing sleep
    /// * `jitter` - Exclusive upper bound of the random part of the pacing sleep
    pub fn new(ceiling: usize, base_delay: Duration, jitter: Duration) -> Self {
        let ceiling = ceiling.max(1);
        let (cancel, _) = watch::channel(false);
        Self {
            permits: Arc::new(Semaphore::new(ceiling)),
            ceiling,
            base_delay,
            jitter,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
            cancel,
        }
    }

    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.max_concurrent,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
        .with_backoff(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_cap_ms),
        )
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Permits not currently held by anyone
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a permit, then sleeps the pacing delay
    ///
    /// # Errors
    ///
    /// Returns `LinkrotError::Cancelled` if [`RateLimiter::cancel`] is called
    /// while waiting or sleeping. A permit that was already granted is
    /// released before returning.
    pub async fn acquire(&self) -> Result<RatePermit> {
        let mut cancelled = self.cancel.subscribe();
        if *cancelled.borrow() {
            return Err(LinkrotError::Cancelled);
        }

        let permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => {
                permit.map_err(|_| LinkrotError::Cancelled)?
            }
            _ = wait_cancelled(&mut cancelled) => return Err(LinkrotError::Cancelled),
        };

        let delay = self.pacing_delay();
        tokio::select! {
            _ = sleep(delay) => Ok(RatePermit { _permit: permit }),
            _ = wait_cancelled(&mut cancelled) => {
                drop(permit);
                Err(LinkrotError::Cancelled)
            }
        }
    }

    /// Cancels every pending and future `acquire`
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
        tracing::debug!("Rate limiter cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Base delay plus uniform jitter in `[0, jitter)`
    fn pacing_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base_delay;
        }
        let extra = rand::thread_rng().gen_range(0..jitter_ms);
        self.base_delay + Duration::from_millis(extra)
    }

    /// Exponential retry delay: `min(base * 2^attempt, cap)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// Resolves once the cancel flag is raised
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            // Sender gone: nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}
