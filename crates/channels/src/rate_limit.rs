//! Sliding-window inbound rate limiting, per sender identity.
//!
//! An in-memory, lock-protected store of recent event instants per key.
//! Exceeding the window fails with `CHANNEL_RATE_LIMITED` and a
//! `retry_after_seconds` hint derived from the oldest event in the window.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use ar_domain::config::RateLimitConfig;
use ar_domain::error::{Error, Result};

pub struct InboundRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InboundRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one event for `key` and check the limit.
    pub fn check(&self, key: &str) -> Result<()> {
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_secs);

        let mut windows = self.windows.lock();
        let events = windows.entry(key.to_owned()).or_default();

        // Expire events that fell out of the window.
        while let Some(front) = events.front() {
            if now.duration_since(*front) >= window {
                events.pop_front();
            } else {
                break;
            }
        }

        if events.len() >= self.config.max_events as usize {
            let retry_after = events
                .front()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window);
            // Round up so callers never retry a second too early.
            let retry_after_seconds = retry_after.as_secs().max(1);
            return Err(Error::rate_limited(
                format!(
                    "inbound limit of {} events per {}s reached for {key}",
                    self.config.max_events, self.config.window_secs
                ),
                retry_after_seconds,
            ));
        }

        events.push_back(now);
        Ok(())
    }

    /// Number of tracked sender keys (for monitoring).
    pub fn tracked_keys(&self) -> usize {
        self.windows.lock().len()
    }
}
