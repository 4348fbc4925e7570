//! Sliding-window request counter, one per external API.

use crate::clock::SharedClock;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clock: SharedClock,
    timestamps: Mutex<VecDeque<DateTime<Utc>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_ms: u64, clock: SharedClock) -> Self {
        Self {
            max_requests,
            window: Duration::milliseconds(window_ms as i64),
            clock,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(&self, timestamps: &mut VecDeque<DateTime<Utc>>, now: DateTime<Utc>) {
        while let Some(oldest) = timestamps.front() {
            if now - *oldest >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// True iff fewer than `max_requests` calls fall inside the trailing window.
    pub fn can_make_request(&self) -> bool {
        let now = self.clock.now();
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut timestamps, now);
        timestamps.len() < self.max_requests
    }

    pub fn record_request(&self) {
        let now = self.clock.now();
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        timestamps.push_back(now);
    }

    /// Checks and records under one lock. Returns false without recording when denied.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut timestamps, now);
        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    pub fn remaining(&self) -> usize {
        let now = self.clock.now();
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut timestamps, now);
        self.max_requests.saturating_sub(timestamps.len())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window_ms", &self.window.num_milliseconds())
            .finish()
    }
}
