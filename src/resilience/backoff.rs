//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Calculate `min(max, base * multiplier^attempt)` plus up to 10% jitter.
///
/// Jitter is added after the cap, so a jittered delay may exceed `max_ms`
/// by at most a tenth.
pub fn calculate_backoff(
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
    multiplier: f64,
    jitter: bool,
) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let exponential = base_ms as f64 * multiplier.powi(exponent);
    let capped_delay = if exponential.is_finite() {
        exponential.min(max_ms as f64) as u64
    } else {
        max_ms
    };

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter && jitter_range > 0 {
        rand::thread_rng().gen_range(0..=jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
