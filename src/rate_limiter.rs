//! Rate limiting for outbound backend requests.
//!
//! Sliding window limiter shared by every request the client issues,
//! regardless of which tool produced it. A sliding window never admits more
//! than the ceiling in any 60-second span, so bursts at a fixed-window
//! boundary cannot double the nominal rate.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::types::{ClientConfig, Error, Result};

/// Length of the rolling window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Proof of admission. Dropping it does not return capacity.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    admitted_at: Instant,
}

impl Permit {
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

/// Point-in-time view of limiter state for health reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub limit: u32,
    pub remaining: u32,
    /// Milliseconds until the oldest admission leaves the window, if any.
    pub resets_in_ms: Option<u64>,
}

/// Admission timestamps within the current window.
#[derive(Debug, Default)]
struct SlidingWindow {
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&ts) = self.admitted.front() {
            if ts + window <= now {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit and record, or return how long until the oldest slot frees.
    fn try_admit(
        &mut self,
        now: Instant,
        limit: u32,
        window: Duration,
    ) -> std::result::Result<(), Duration> {
        self.prune(now, window);
        if self.admitted.len() < limit as usize {
            self.admitted.push_back(now);
            return Ok(());
        }
        let oldest = self.admitted.front().copied().unwrap_or(now);
        Err((oldest + window).saturating_duration_since(now))
    }

    fn live(&self, now: Instant, window: Duration) -> impl Iterator<Item = &Instant> + '_ {
        self.admitted.iter().filter(move |&&ts| ts + window > now)
    }
}

/// Rate limiter - process-wide ceiling on request starts per rolling minute.
///
/// Check-and-record runs under a single lock, so two callers can never both
/// take the last slot. The lock is never held across a sleep.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    max_wait: Duration,
    state: Mutex<SlidingWindow>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32, max_wait: Duration) -> Self {
        Self::with_window(limit_per_minute, WINDOW, max_wait)
    }

    pub fn with_window(limit: u32, window: Duration, max_wait: Duration) -> Self {
        Self {
            limit,
            window,
            max_wait,
            state: Mutex::new(SlidingWindow::default()),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.rate_limit_per_minute, config.rate_limit_max_wait)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Admit immediately or fail with `RateLimited` carrying the wait hint.
    pub async fn try_acquire(&self) -> Result<Permit> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.try_admit(now, self.limit, self.window) {
            Ok(()) => Ok(Permit { admitted_at: now }),
            Err(wait) => Err(Error::rate_limited(wait)),
        }
    }

    /// Admit, waiting cooperatively for a free slot up to the configured bound.
    pub async fn acquire(&self) -> Result<Permit> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let now = Instant::now();
            let wait = {
                let mut state = self.state.lock().await;
                match state.try_admit(now, self.limit, self.window) {
                    Ok(()) => return Ok(Permit { admitted_at: now }),
                    Err(wait) => wait,
                }
            };

            if now + wait > deadline {
                tracing::debug!(
                    wait_ms = wait.as_millis() as u64,
                    limit = self.limit,
                    "rate limit slot not available within bounded wait"
                );
                return Err(Error::rate_limited(wait));
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Slots still available in the current window. Does not mutate state.
    pub async fn remaining(&self) -> u32 {
        let now = Instant::now();
        let state = self.state.lock().await;
        let used = state.live(now, self.window).count() as u32;
        self.limit.saturating_sub(used)
    }

    /// When the oldest live admission expires. Does not mutate state.
    pub async fn next_reset(&self) -> Option<Instant> {
        let now = Instant::now();
        let state = self.state.lock().await;
        let oldest = state.live(now, self.window).next().copied();
        oldest.map(|ts| ts + self.window)
    }

    pub async fn snapshot(&self) -> RateLimitSnapshot {
        let now = Instant::now();
        let state = self.state.lock().await;
        let mut live = state.live(now, self.window);
        let oldest = live.next().copied();
        let used = oldest.map_or(0, |_| 1 + live.count()) as u32;
        RateLimitSnapshot {
            limit: self.limit,
            remaining: self.limit.saturating_sub(used),
            resets_in_ms: oldest
                .map(|ts| (ts + self.window).saturating_duration_since(now).as_millis() as u64),
        }
    }
}
