//! Per-source rate limiting with exponential backoff.
//!
//! Each source gets a bucket sized to its declared hourly budget with
//! per-minute smoothing (a minimum spacing between grants). A source that
//! reports `rate_limited` enters an exponential backoff window during which
//! acquisitions block or fail fast depending on the caller's choice. The
//! controller is a process-wide singleton constructed at startup and handed
//! to the scheduler.

use crate::config::RateLimitSettings;
use crate::error::{Error, Result};
use dashmap::DashMap;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const ROLLING_WINDOW: Duration = Duration::from_secs(3600);

/// How an acquisition should behave when the bucket cannot grant immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireMode {
    /// Wait (FIFO) until a token is available or the deadline passes
    Block,
    /// Return `rate_limited` immediately instead of waiting
    FailFast,
}

/// Rolling-hour grant accounting plus pacing for one source.
struct GrantState {
    /// Timestamps of grants within the rolling hour
    grants: VecDeque<Instant>,
    /// Earliest instant the next grant may be handed out (smoothing)
    next_slot: Instant,
}

/// Backoff state kept outside the grant lock so failure reports never
/// wait behind a sleeping acquirer.
struct BackoffState {
    until: Option<Instant>,
    exponent: u32,
}

struct SourceBucket {
    per_hour: u32,
    min_spacing: Duration,
    grant_state: Mutex<GrantState>,
    backoff: StdMutex<BackoffState>,
}

impl SourceBucket {
    fn new(per_hour: u32) -> Self {
        let per_hour = per_hour.max(1);
        // Smoothing spreads the hourly budget evenly over the hour.
        let min_spacing = Duration::from_secs_f64(3600.0 / per_hour as f64);
        Self {
            per_hour,
            min_spacing,
            grant_state: Mutex::new(GrantState {
                grants: VecDeque::new(),
                next_slot: Instant::now(),
            }),
            backoff: StdMutex::new(BackoffState {
                until: None,
                exponent: 0,
            }),
        }
    }

    fn backoff_remaining(&self, now: Instant) -> Option<Duration> {
        let state = self.backoff.lock().expect("backoff lock poisoned");
        state
            .until
            .and_then(|until| until.checked_duration_since(now))
    }
}

/// Snapshot of controller counters
#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimitStats {
    pub granted: u64,
    pub throttled: u64,
    pub backoffs_started: u64,
}

/// Process-wide rate-limit controller, one token bucket per source.
pub struct RateLimitController {
    buckets: DashMap<String, Arc<SourceBucket>>,
    settings: RateLimitSettings,
    granted: AtomicU64,
    throttled: AtomicU64,
    backoffs_started: AtomicU64,
}

impl RateLimitController {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            buckets: DashMap::new(),
            settings,
            granted: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            backoffs_started: AtomicU64::new(0),
        }
    }

    /// Declare a source's hourly budget. Called at connector registration;
    /// acquiring for an undeclared source uses the configured default.
    pub fn declare_source(&self, source: &str, per_hour: u32) {
        self.buckets
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(SourceBucket::new(per_hour)));
    }

    fn bucket(&self, source: &str) -> Arc<SourceBucket> {
        self.buckets
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(SourceBucket::new(self.settings.default_per_hour)))
            .clone()
    }

    /// Acquire a request token for `source`.
    ///
    /// `Block` waits FIFO behind earlier acquirers (the grant lock is a fair
    /// queue); `FailFast` returns `rate_limited` if a wait would be needed.
    /// A `deadline` bounds the total wait in either mode.
    pub async fn acquire(
        &self,
        source: &str,
        mode: AcquireMode,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let bucket = self.bucket(source);

        if mode == AcquireMode::FailFast {
            return self.try_acquire_fail_fast(source, &bucket);
        }

        // Fair queue: tokio's mutex wakes waiters in FIFO order, so holding
        // the guard across the pacing sleep serializes grants per source.
        let mut state = bucket.grant_state.lock().await;

        loop {
            let now = Instant::now();
            while let Some(front) = state.grants.front() {
                if now.duration_since(*front) > ROLLING_WINDOW {
                    state.grants.pop_front();
                } else {
                    break;
                }
            }

            let mut ready_at = state.next_slot;
            if state.grants.len() as u32 >= bucket.per_hour {
                // Rolling hour exhausted: wait until the oldest grant ages out.
                let oldest = *state.grants.front().expect("non-empty at capacity");
                ready_at = ready_at.max(oldest + ROLLING_WINDOW);
            }
            if let Some(backoff) = bucket.backoff_remaining(now) {
                ready_at = ready_at.max(now + backoff);
            }

            if ready_at <= now {
                state.grants.push_back(now);
                state.next_slot = now + bucket.min_spacing;
                self.granted.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }

            if let Some(deadline) = deadline {
                if ready_at > deadline {
                    self.throttled.fetch_add(1, Ordering::Relaxed);
                    return Err(Error::rate_limited(format!(
                        "source '{}' cannot grant before deadline",
                        source
                    ))
                    .with_source_name(source)
                    .add_metadata(
                        "retry_after_ms",
                        serde_json::json!(ready_at.duration_since(now).as_millis() as u64),
                    ));
                }
            }

            tokio::time::sleep(ready_at.duration_since(now)).await;
            // Re-check: a backoff window may have been set while sleeping.
        }
    }

    fn try_acquire_fail_fast(&self, source: &str, bucket: &SourceBucket) -> Result<()> {
        let Ok(mut state) = bucket.grant_state.try_lock() else {
            self.throttled.fetch_add(1, Ordering::Relaxed);
            return Err(Error::rate_limited(format!(
                "source '{}' has waiting acquirers",
                source
            ))
            .with_source_name(source));
        };

        let now = Instant::now();
        while let Some(front) = state.grants.front() {
            if now.duration_since(*front) > ROLLING_WINDOW {
                state.grants.pop_front();
            } else {
                break;
            }
        }

        let window_full = state.grants.len() as u32 >= bucket.per_hour;
        let backing_off = bucket.backoff_remaining(now).is_some();
        if window_full || backing_off || state.next_slot > now {
            self.throttled.fetch_add(1, Ordering::Relaxed);
            return Err(
                Error::rate_limited(format!("source '{}' budget exhausted", source))
                    .with_source_name(source),
            );
        }

        state.grants.push_back(now);
        state.next_slot = now + bucket.min_spacing;
        self.granted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Report that `source` returned `rate_limited` (or HTTP 429). Starts or
    /// extends the exponential backoff window.
    pub fn record_rate_limited(&self, source: &str) {
        let bucket = self.bucket(source);
        let mut backoff = bucket.backoff.lock().expect("backoff lock poisoned");

        let base = self.settings.backoff_base_ms as f64;
        let factor = self.settings.backoff_factor.max(1.0);
        let raw_ms = (base * factor.powi(backoff.exponent as i32))
            .min(self.settings.backoff_cap_ms as f64);

        let jitter_frac = self.settings.backoff_jitter_frac;
        let jitter = if jitter_frac > 0.0 {
            rand::thread_rng().gen_range(-jitter_frac..=jitter_frac)
        } else {
            0.0
        };
        let delay_ms = (raw_ms * (1.0 + jitter)).max(0.0);

        backoff.until = Some(Instant::now() + Duration::from_millis(delay_ms as u64));
        backoff.exponent = backoff.exponent.saturating_add(1);
        self.backoffs_started.fetch_add(1, Ordering::Relaxed);

        warn!(
            source = source,
            delay_ms = delay_ms as u64,
            exponent = backoff.exponent,
            "rate limit backoff window set"
        );
    }

    /// Report a successful request after backoff; resets the exponent.
    pub fn record_success(&self, source: &str) {
        let bucket = self.bucket(source);
        let mut backoff = bucket.backoff.lock().expect("backoff lock poisoned");
        if backoff.exponent > 0 {
            debug!(source = source, "rate limit backoff reset");
        }
        backoff.exponent = 0;
        backoff.until = None;
    }

    /// Whether the source is currently inside a backoff window.
    pub fn is_backing_off(&self, source: &str) -> bool {
        self.bucket(source)
            .backoff_remaining(Instant::now())
            .is_some()
    }

    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            granted: self.granted.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            backoffs_started: self.backoffs_started.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RateLimitSettings {
        RateLimitSettings {
            default_per_hour: 3600,
            backoff_base_ms: 20,
            backoff_factor: 2.0,
            backoff_cap_ms: 200,
            backoff_jitter_frac: 0.0,
        }
    }

    #[tokio::test]
    async fn test_grant_within_budget() {
        let controller = RateLimitController::new(settings());
        controller.declare_source("fast", 3600);

        controller
            .acquire("fast", AcquireMode::Block, None)
            .await
            .unwrap();
        assert_eq!(controller.stats().granted, 1);
    }

    #[tokio::test]
    async fn test_fail_fast_when_paced() {
        let controller = RateLimitController::new(settings());
        // 1/hour means the second acquisition needs a full spacing wait.
        controller.declare_source("slow", 1);

        controller
            .acquire("slow", AcquireMode::FailFast, None)
            .await
            .unwrap();
        let second = controller.acquire("slow", AcquireMode::FailFast, None).await;
        assert!(second.is_err());
        assert_eq!(controller.stats().throttled, 1);
    }

    #[tokio::test]
    async fn test_deadline_bounds_blocking_wait() {
        let controller = RateLimitController::new(settings());
        controller.declare_source("slow", 1);

        controller
            .acquire("slow", AcquireMode::Block, None)
            .await
            .unwrap();
        let deadline = Instant::now() + Duration::from_millis(10);
        let result = controller
            .acquire("slow", AcquireMode::Block, Some(deadline))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_backoff_blocks_fail_fast_and_resets() {
        let controller = RateLimitController::new(settings());
        controller.declare_source("flaky", 3600);

        controller.record_rate_limited("flaky");
        assert!(controller.is_backing_off("flaky"));
        assert!(controller
            .acquire("flaky", AcquireMode::FailFast, None)
            .await
            .is_err());

        controller.record_success("flaky");
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(controller
            .acquire("flaky", AcquireMode::FailFast, None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_backoff_exponent_grows_to_cap() {
        let controller = RateLimitController::new(settings());
        controller.declare_source("flaky", 3600);

        for _ in 0..10 {
            controller.record_rate_limited("flaky");
        }
        // Cap bounds the window; after the cap the source still recovers.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!controller.is_backing_off("flaky"));
    }
}
