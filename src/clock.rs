//! Wall-clock helpers.
//!
//! Monotonic deadlines (circuit retry times, cache expiry) use
//! `tokio::time::Instant` so tests can pause and advance time. Anything that
//! leaves the process (events, history entries, webhook timestamps) uses Unix
//! time from the functions below.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Seconds since the Unix epoch.
pub fn unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
