//! Hand-off of validated notifications to business handling.
//!
//! The HTTP handler pushes each validated notification onto a bounded queue
//! and answers the gateway immediately. The dispatcher drains the queue and
//! passes each notification to a `NotificationSink`.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::payments::types::{PaymentNotification, ValidatedNotification};

/// Receiver of validated notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn handle(&self, notification: PaymentNotification, source: &ValidatedNotification);
}

/// Default sink: logs the notification.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn handle(&self, notification: PaymentNotification, source: &ValidatedNotification) {
        tracing::info!(
            event = %notification.event,
            payment_id = %notification.payment_id,
            status = ?notification.status,
            source_ip = %source.source_ip,
            "Payment notification received"
        );
    }
}

/// Create the queue between the HTTP handler and the dispatcher.
pub fn notification_queue(
    capacity: usize,
) -> (mpsc::Sender<ValidatedNotification>, mpsc::Receiver<ValidatedNotification>) {
    mpsc::channel(capacity.max(1))
}

pub struct NotificationDispatcher<S> {
    rx: mpsc::Receiver<ValidatedNotification>,
    sink: S,
}

impl<S: NotificationSink> NotificationDispatcher<S> {
    pub fn new(rx: mpsc::Receiver<ValidatedNotification>, sink: S) -> Self {
        Self { rx, sink }
    }

    /// Run until shutdown or until every sender is gone. Notifications still
    /// queued at shutdown are drained first. Returns how many were handled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        let mut handled = 0u64;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    self.rx.close();
                    while let Some(queued) = self.rx.recv().await {
                        self.dispatch(queued).await;
                        handled += 1;
                    }
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(queued) => {
                        self.dispatch(queued).await;
                        handled += 1;
                    }
                    None => break,
                },
            }
        }
        tracing::info!(handled = handled, "Notification dispatcher stopped");
        handled
    }

    async fn dispatch(&self, queued: ValidatedNotification) {
        match PaymentNotification::from_slice(&queued.body) {
            Ok(notification) => self.sink.handle(notification, &queued).await,
            Err(e) => {
                // Authentic but unreadable: nothing to retry, the gateway already got 200.
                tracing::warn!(
                    error = %e,
                    source_ip = %queued.source_ip,
                    bytes = queued.body.len(),
                    "Dropping notification with unreadable body"
                );
            }
        }
    }
}
