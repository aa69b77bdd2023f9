//! Loan notifications
//!
//! The engine publishes a [`LoanNotification`] after each committed operation
//! onto a bounded channel. A [`NotificationWorker`] drains the channel and
//! hands each notification to a [`Notifier`]. Publishing never waits and
//! delivery failures never reach the engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::types::{LoanEventKind, LoanView};
use crate::resources::Rider;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Error, Debug, Clone)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// A loan event addressed to the rider
#[derive(Debug, Clone)]
pub struct LoanNotification {
    pub kind: LoanEventKind,
    pub loan: LoanView,
    pub rider_name: String,
    pub rider_email: String,
}

impl LoanNotification {
    pub fn new(kind: LoanEventKind, loan: LoanView, rider: &Rider) -> Self {
        Self {
            kind,
            loan,
            rider_name: rider.name.clone(),
            rider_email: rider.email.clone(),
        }
    }

    /// Human readable message body
    pub fn render(&self) -> String {
        let loan = &self.loan;
        match self.kind {
            LoanEventKind::Opened => format!(
                "========= LOAN OPENED =========\n\
                 Rider: {}\n\
                 Email: {}\n\
                 Started: {}\n\
                 Bicycle: {}\n\
                 Dock: {}\n\
                 Charged: {:.2}\n\
                 ===============================",
                self.rider_name,
                self.rider_email,
                format_ts(loan.started_at),
                loan.bicycle_id,
                loan.origin_dock_id,
                loan.initial_fee,
            ),
            LoanEventKind::Closed => {
                let overtime = loan.overtime_fee.unwrap_or(Decimal::ZERO);
                format!(
                    "========= BICYCLE RETURNED =========\n\
                     Rider: {}\n\
                     Email: {}\n\
                     Started: {}\n\
                     Ended: {}\n\
                     Bicycle: {}\n\
                     Dock: {}\n\
                     Initial fee: {:.2}\n\
                     Overtime fee: {:.2}\n\
                     Total: {:.2}\n\
                     ====================================",
                    self.rider_name,
                    self.rider_email,
                    format_ts(loan.started_at),
                    loan.ended_at.map(format_ts).unwrap_or_default(),
                    loan.bicycle_id,
                    loan.destination_dock_id.unwrap_or_default(),
                    loan.initial_fee,
                    overtime,
                    loan.initial_fee + overtime,
                )
            }
        }
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &LoanNotification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &LoanNotification) -> Result<(), NotifyError> {
        info!(
            to = %notification.rider_email,
            loan_id = %notification.loan.loan_id,
            "Sending notification\n{}",
            notification.render()
        );
        Ok(())
    }
}

// ============================================================================
// Notification Channel
// ============================================================================

/// Create a bounded notification channel
pub fn notification_channel(buffer: usize) -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (NotificationSender { tx }, NotificationReceiver { rx })
}

/// Engine side of the notification channel
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::Sender<LoanNotification>,
}

impl NotificationSender {
    /// Queue a notification without waiting; drops it if the queue is full or closed
    pub fn publish(&self, notification: LoanNotification) {
        let loan_id = notification.loan.loan_id.clone();
        let kind = notification.kind.as_str();
        match self.tx.try_send(notification) {
            Ok(()) => debug!(loan_id = %loan_id, kind, "Notification queued"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(loan_id = %loan_id, kind, "Notification queue full, dropping notification")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(
                    loan_id = %loan_id,
                    kind,
                    "Notification channel closed, dropping notification"
                )
            }
        }
    }
}

/// Worker side of the notification channel
pub struct NotificationReceiver {
    rx: mpsc::Receiver<LoanNotification>,
}

impl NotificationReceiver {
    pub async fn recv(&mut self) -> Option<LoanNotification> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<LoanNotification> {
        self.rx.try_recv().ok()
    }
}

// ============================================================================
// Notification Worker
// ============================================================================

/// Drains the notification channel into a notifier
pub struct NotificationWorker {
    receiver: NotificationReceiver,
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    pub fn new(receiver: NotificationReceiver, notifier: Arc<dyn Notifier>) -> Self {
        Self { receiver, notifier }
    }

    /// Run until every sender is dropped. Returns the number of notifications
    /// delivered successfully.
    pub async fn run(mut self) -> usize {
        info!(notifier = self.notifier.name(), "Starting notification worker");

        let mut delivered = 0;
        while let Some(notification) = self.receiver.recv().await {
            match self.notifier.notify(&notification).await {
                Ok(()) => delivered += 1,
                Err(e) => error!(
                    loan_id = %notification.loan.loan_id,
                    kind = notification.kind.as_str(),
                    error = %e,
                    "Notification delivery failed"
                ),
            }
        }

        info!(delivered, "Notification worker stopped");
        delivered
    }
}

/// Mock notifier for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MockNotifier {
        notify_count: AtomicUsize,
        fail: Mutex<bool>,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self {
                notify_count: AtomicUsize::new(0),
                fail: Mutex::new(false),
            }
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub fn notify_count(&self) -> usize {
            self.notify_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn notify(&self, _notification: &LoanNotification) -> Result<(), NotifyError> {
            self.notify_count.fetch_add(1, Ordering::SeqCst);
            if *self.fail.lock().unwrap() {
                return Err(NotifyError::Delivery("Mocked failure".to_string()));
            }
            Ok(())
        }
    }
}
