//! Rolling outcome statistics for one dependency.
//!
//! # Responsibilities
//! - Keep the most recent call outcomes in a fixed-capacity ring buffer
//! - Drop samples older than the monitoring window when new samples arrive
//! - Derive error rate, slow-call rate and latency percentiles on demand
//!
//! # Design Decisions
//! - Count-bounded AND time-bounded: capacity caps memory, the window caps age
//! - Eviction only happens on `record`, so read paths never mutate
//! - Percentiles sort a copy of the durations; the buffer stays in arrival order

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

/// Default number of samples retained per dependency.
pub const DEFAULT_SAMPLE_CAPACITY: usize = 1000;

/// One observed call outcome.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeSample {
    pub timestamp: Instant,
    pub success: bool,
    pub duration: Duration,
    pub slow: bool,
}

/// Derived view over the retained samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub samples: usize,
    pub failures: usize,
    pub slow_calls: usize,
    /// Failure percentage (0-100).
    pub error_rate: f64,
    /// Slow-call percentage (0-100).
    pub slow_call_rate: f64,
    pub avg_duration_ms: f64,
    pub p95_duration_ms: u64,
    pub p99_duration_ms: u64,
}

/// Fixed-capacity ring buffer of outcome samples.
#[derive(Debug, Clone)]
pub struct RollingStatistics {
    samples: VecDeque<OutcomeSample>,
    capacity: usize,
    window: Duration,
    failures: usize,
    slow_calls: usize,
}

impl RollingStatistics {
    /// Create a buffer holding at most `capacity` samples no older than `window`.
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            window,
            failures: 0,
            slow_calls: 0,
        }
    }

    /// Record a sample, evicting expired and overflowing entries first.
    pub fn record(&mut self, sample: OutcomeSample) {
        self.evict_older_than(sample.timestamp);

        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.forget(&oldest);
            }
        }

        if !sample.success {
            self.failures += 1;
        }
        if sample.slow {
            self.slow_calls += 1;
        }
        self.samples.push_back(sample);
    }

    fn evict_older_than(&mut self, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.saturating_duration_since(front.timestamp) <= self.window {
                break;
            }
            if let Some(expired) = self.samples.pop_front() {
                self.forget(&expired);
            }
        }
    }

    fn forget(&mut self, sample: &OutcomeSample) {
        if !sample.success {
            self.failures = self.failures.saturating_sub(1);
        }
        if sample.slow {
            self.slow_calls = self.slow_calls.saturating_sub(1);
        }
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Failure percentage over retained samples.
    pub fn error_rate(&self) -> f64 {
        percentage(self.failures, self.samples.len())
    }

    /// Slow-call percentage over retained samples.
    pub fn slow_call_rate(&self) -> f64 {
        percentage(self.slow_calls, self.samples.len())
    }

    /// Arithmetic mean of retained durations in milliseconds.
    pub fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .samples
            .iter()
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .sum();
        total / self.samples.len() as f64
    }

    /// Duration at the given percentile (0.0-1.0) in milliseconds.
    pub fn percentile_ms(&self, percentile: f64) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = self
            .samples
            .iter()
            .map(|s| s.duration.as_millis() as u64)
            .collect();
        sorted.sort_unstable();

        let rank = (percentile.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
        sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.failures = 0;
        self.slow_calls = 0;
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            samples: self.samples.len(),
            failures: self.failures,
            slow_calls: self.slow_calls,
            error_rate: self.error_rate(),
            slow_call_rate: self.slow_call_rate(),
            avg_duration_ms: self.average_ms(),
            p95_duration_ms: self.percentile_ms(0.95),
            p99_duration_ms: self.percentile_ms(0.99),
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(at: Instant, success: bool, ms: u64) -> OutcomeSample {
        OutcomeSample {
            timestamp: at,
            success,
            duration: Duration::from_millis(ms),
            slow: false,
        }
    }

    #[test]
    fn test_error_rate_and_average() {
        let now = Instant::now();
        let mut stats = RollingStatistics::new(10, Duration::from_secs(60));
        stats.record(sample(now, true, 100));
        stats.record(sample(now, false, 200));

        assert_eq!(stats.len(), 2);
        assert_eq!(stats.error_rate(), 50.0);
        assert_eq!(stats.average_ms(), 150.0);
    }

    #[test]
    fn test_capacity_bounds_samples() {
        let now = Instant::now();
        let mut stats = RollingStatistics::new(3, Duration::from_secs(60));
        stats.record(sample(now, false, 10));
        stats.record(sample(now, true, 10));
        stats.record(sample(now, true, 10));
        stats.record(sample(now, true, 10));

        // The only failure was the oldest sample and has been pushed out.
        assert_eq!(stats.len(), 3);
        assert_eq!(stats.error_rate(), 0.0);
    }

    #[test]
    fn test_window_evicts_old_samples_on_record() {
        let start = Instant::now();
        let mut stats = RollingStatistics::new(100, Duration::from_secs(10));
        stats.record(sample(start, false, 10));
        stats.record(sample(start + Duration::from_secs(11), true, 10));

        assert_eq!(stats.len(), 1);
        assert_eq!(stats.error_rate(), 0.0);
    }

    #[test]
    fn test_percentiles() {
        let now = Instant::now();
        let mut stats = RollingStatistics::new(1000, Duration::from_secs(60));
        for ms in 1..=100 {
            stats.record(sample(now, true, ms));
        }

        assert_eq!(stats.percentile_ms(0.95), 95);
        assert_eq!(stats.percentile_ms(0.99), 99);
        assert_eq!(stats.percentile_ms(1.0), 100);
    }

    #[test]
    fn test_slow_call_rate() {
        let now = Instant::now();
        let mut stats = RollingStatistics::new(10, Duration::from_secs(60));
        let mut slow = sample(now, true, 900);
        slow.slow = true;
        stats.record(slow);
        stats.record(sample(now, true, 10));
        stats.record(sample(now, true, 10));
        stats.record(sample(now, true, 10));

        assert_eq!(stats.slow_call_rate(), 25.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = RollingStatistics::new(10, Duration::from_secs(60));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.samples, 0);
        assert_eq!(snapshot.error_rate, 0.0);
        assert_eq!(snapshot.p99_duration_ms, 0);
        assert_eq!(snapshot, stats.snapshot());
    }
}
