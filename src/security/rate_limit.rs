//! Fixed-window rate limiting per source.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Request count inside the current window for one source.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Counts requests per key in fixed windows.
///
/// Each check runs under the key's shard lock, so concurrent requests from
/// one source never lose an increment. Rejected requests are not counted
/// toward the window.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    window_ms: AtomicU64,
    max_requests: AtomicU32,
    violations: AtomicU64,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            windows: DashMap::new(),
            window_ms: AtomicU64::new(window.as_millis() as u64),
            max_requests: AtomicU32::new(max_requests),
            violations: AtomicU64::new(0),
        }
    }

    /// Apply new limits. Existing windows keep their counts.
    pub fn set_limits(&self, window: Duration, max_requests: u32) {
        self.window_ms.store(window.as_millis() as u64, Ordering::Relaxed);
        self.max_requests.store(max_requests, Ordering::Relaxed);
    }

    fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.load(Ordering::Relaxed))
    }

    /// Count a request from `key`. Returns false when the key is over its limit.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let window = self.window();
        let max = self.max_requests.load(Ordering::Relaxed);

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.saturating_duration_since(entry.started) > window {
            entry.count = 0;
            entry.started = now;
        }

        if entry.count >= max {
            drop(entry);
            self.violations.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        entry.count += 1;
        true
    }

    /// Requests counted for `key` in its live window.
    pub fn current_count(&self, key: &str) -> u32 {
        let now = Instant::now();
        let window = self.window();
        self.windows
            .get(key)
            .filter(|w| now.saturating_duration_since(w.started) <= window)
            .map(|w| w.count)
            .unwrap_or(0)
    }

    /// Drop windows that started more than `max_age` ago. A window that is
    /// still live is kept even when `max_age` is shorter than the window.
    pub fn purge(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let max_age = max_age.max(self.window());
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) <= max_age);
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Requests rejected since startup.
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }
}
