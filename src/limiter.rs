//! Per-provider admission control.
//!
//! Each provider gets one independent [`RateLimiter`] tracking rolling
//! minute and hour windows. The admission check and the counter update are a
//! single atomic step under one mutex, so concurrent callers can never
//! jointly exceed a window.

use crate::api::RateLimitPolicy;
use crate::error::{GatewayError, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Sliding-window rate limiter for one provider.
///
/// Uses `tokio::time::Instant` throughout so paused-clock tests observe
/// deterministic window behavior.
pub struct RateLimiter {
    provider: String,
    policy: RateLimitPolicy,
    windows: Mutex<Windows>,
}

#[derive(Default)]
struct Windows {
    minute: VecDeque<Instant>,
    hour: VecDeque<Instant>,
}

impl Windows {
    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.minute.front() {
            if now.duration_since(*front) >= MINUTE {
                self.minute.pop_front();
            } else {
                break;
            }
        }
        while let Some(front) = self.hour.front() {
            if now.duration_since(*front) >= HOUR {
                self.hour.pop_front();
            } else {
                break;
            }
        }
    }

    /// Time until the window's earliest admission slides out, freeing a slot.
    fn slot_frees_in(queue: &VecDeque<Instant>, window: Duration, now: Instant) -> Duration {
        match queue.front() {
            Some(front) => (*front + window).saturating_duration_since(now),
            None => window,
        }
    }
}

impl RateLimiter {
    /// Create a limiter for `provider` with the given policy.
    pub fn new(provider: impl Into<String>, policy: RateLimitPolicy) -> Self {
        Self {
            provider: provider.into(),
            policy,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Atomic check-and-record: admit now, or report how long until the next
    /// slot frees up.
    fn try_admit(&self) -> std::result::Result<(), Duration> {
        let mut windows = self.windows.lock().unwrap();
        let now = Instant::now();
        windows.prune(now);

        let minute_full = windows.minute.len() >= self.policy.requests_per_minute as usize;
        let hour_full = windows.hour.len() >= self.policy.requests_per_hour as usize;

        if !minute_full && !hour_full {
            windows.minute.push_back(now);
            windows.hour.push_back(now);
            return Ok(());
        }

        // Both windows must have room; wait for the binding constraint.
        let mut retry_after = Duration::ZERO;
        if minute_full {
            retry_after = retry_after.max(Windows::slot_frees_in(&windows.minute, MINUTE, now));
        }
        if hour_full {
            retry_after = retry_after.max(Windows::slot_frees_in(&windows.hour, HOUR, now));
        }
        Err(retry_after)
    }

    /// Non-blocking admission: admit immediately or fail with
    /// [`GatewayError::RateLimited`] carrying `retry_after`.
    pub fn try_acquire(&self) -> Result<()> {
        self.try_admit().map_err(|retry_after| {
            metrics::counter!("rate_limiter.rejected.total", "provider" => self.provider.clone())
                .increment(1);
            GatewayError::RateLimited { retry_after }
        })
    }

    /// Blocking admission: wait (async) until a window slot frees, bounded by
    /// the policy's `max_wait_ms`.
    ///
    /// Fails with [`GatewayError::RateLimited`] when the wait for the next
    /// slot would exceed the bound. The caller's own deadline can cancel the
    /// wait early by dropping the future.
    pub async fn acquire(&self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_millis(self.policy.max_wait_ms);
        loop {
            match self.try_admit() {
                Ok(()) => return Ok(()),
                Err(retry_after) => {
                    let now = Instant::now();
                    if now + retry_after > deadline {
                        metrics::counter!(
                            "rate_limiter.rejected.total",
                            "provider" => self.provider.clone()
                        )
                        .increment(1);
                        return Err(GatewayError::RateLimited { retry_after });
                    }
                    tracing::debug!(
                        provider = %self.provider,
                        wait_ms = retry_after.as_millis() as u64,
                        "Waiting for rate-limit slot"
                    );
                    // Another caller may take the freed slot first; loop and
                    // re-check under the lock.
                    tokio::time::sleep_until(now + retry_after).await;
                }
            }
        }
    }
}
