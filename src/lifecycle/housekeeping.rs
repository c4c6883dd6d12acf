//! Periodic purge of expired replay and rate-limit entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::security::webhook::WebhookValidator;

/// Owns the sweep task. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct HousekeepingHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<u64>>,
}

impl HousekeepingHandle {
    /// Stop the task and wait for it. Returns the number of sweeps run.
    pub async fn stop(mut self) -> u64 {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        match self.task.take() {
            Some(task) => task.await.unwrap_or(0),
            None => 0,
        }
    }
}

impl Drop for HousekeepingHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Sweep `validator` every `interval`, starting one interval from now.
pub fn spawn_housekeeping(validator: Arc<WebhookValidator>, interval: Duration) -> HousekeepingHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let period = interval.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        tracing::info!(interval_secs = period.as_secs(), "Housekeeping starting");
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sweeps = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = validator.sweep();
                    sweeps += 1;
                    if report.replay_purged > 0 || report.rate_limit_purged > 0 {
                        tracing::debug!(
                            replay_purged = report.replay_purged,
                            rate_limit_purged = report.rate_limit_purged,
                            "Expired webhook entries purged"
                        );
                    }
                }
                _ = &mut stop_rx => {
                    tracing::info!("Housekeeping stopped");
                    break;
                }
            }
        }
        sweeps
    });

    HousekeepingHandle {
        stop_tx: Some(stop_tx),
        task: Some(task),
    }
}
