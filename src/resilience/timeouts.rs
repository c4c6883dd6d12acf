//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a gateway call against its deadline
//! - Measure call duration for slow-call tracking
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the losing future is dropped
//! - A timed-out call reports `None` and is treated as a failure by the gate

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Result of a deadline-bounded call.
#[derive(Debug)]
pub struct TimedCall<T> {
    /// `None` when the deadline elapsed first.
    pub output: Option<T>,
    pub elapsed: Duration,
}

impl<T> TimedCall<T> {
    pub fn timed_out(&self) -> bool {
        self.output.is_none()
    }
}

/// Run `future` for at most `deadline`.
pub async fn run_with_deadline<F>(deadline: Duration, future: F) -> TimedCall<F::Output>
where
    F: Future,
{
    let started = Instant::now();
    let output = tokio::time::timeout(deadline, future).await.ok();
    TimedCall {
        output,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let call = run_with_deadline(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            42
        })
        .await;
        assert_eq!(call.output, Some(42));
        assert_eq!(call.elapsed, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let call = run_with_deadline(Duration::from_millis(100), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
        })
        .await;
        assert!(call.timed_out());
        assert_eq!(call.elapsed, Duration::from_millis(100));
    }
}
