//! Client-side sliding-window rate limiting.
//!
//! Enforced before any network attempt: when the window is full the call
//! fails fast with [`BifrostError::RateLimitExceeded`] without contacting
//! a provider.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{BifrostError, Result};
use crate::telemetry;

/// Default requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 30;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Sliding-window request counter.
///
/// Timestamps older than the window are pruned on each check, so the
/// limit applies to the trailing window rather than fixed intervals.
pub struct SlidingWindow {
    max_requests: u32,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindow {
    /// Create a limiter with the default configuration (30 requests/min).
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }

    /// Create a limiter with a custom limit and window.
    pub fn with_config(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    /// Record one request, or reject it if the window is already full.
    pub fn check(&self, operation: &'static str) -> Result<()> {
        let now = Instant::now();
        let mut timestamps = self
            .timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() as u32 >= self.max_requests {
            metrics::counter!(telemetry::RATE_LIMITED_TOTAL, "operation" => operation)
                .increment(1);
            return Err(BifrostError::RateLimitExceeded {
                current: timestamps.len() as u32,
                max: self.max_requests,
            });
        }

        timestamps.push_back(now);
        Ok(())
    }

    /// Requests currently counted inside the window.
    pub fn current(&self) -> u32 {
        let now = Instant::now();
        let timestamps = self
            .timestamps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        timestamps
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count() as u32
    }
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self::new()
    }
}
