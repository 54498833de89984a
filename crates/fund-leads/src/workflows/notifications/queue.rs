//! Background delivery for request-triggered notifications.
//!
//! Handlers push jobs onto a bounded channel and return as soon as persistence succeeds.
//! Enqueueing never waits: when the channel is full the job is dropped, logged and counted.
//! A single worker task drains the channel through the dispatcher. Dropping every
//! [`NotificationQueue`] closes the channel; [`NotificationWorker::shutdown`] then waits
//! until the queued jobs have been delivered.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::dispatcher::NotificationDispatcher;
use super::templates::NotificationPayload;
use crate::workflows::enquiries::domain::Recipient;

#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub payload: NotificationPayload,
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("notification queue is full")]
    Full,
    #[error("notification worker has stopped")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: mpsc::Sender<NotificationJob>,
}

impl NotificationQueue {
    /// Hands the job to the worker without waiting for capacity.
    pub fn enqueue(&self, job: NotificationJob) -> Result<(), QueueError> {
        self.tx.try_send(job).map_err(|err| {
            let (job, error) = match err {
                TrySendError::Full(job) => (job, QueueError::Full),
                TrySendError::Closed(job) => (job, QueueError::Closed),
            };
            counter!(
                "fund_leads_notifications_dropped_total",
                "email_type" => job.payload.email_type().label()
            )
            .increment(job.recipients.len() as u64);
            error
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub jobs: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct NotificationWorker {
    handle: JoinHandle<WorkerStats>,
}

impl NotificationWorker {
    pub fn spawn(
        dispatcher: Arc<NotificationDispatcher>,
        capacity: usize,
    ) -> (NotificationQueue, NotificationWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(rx, dispatcher));
        (NotificationQueue { tx }, NotificationWorker { handle })
    }

    /// Resolves after every queue handle is dropped and the backlog is drained.
    pub async fn shutdown(self) -> WorkerStats {
        match self.handle.await {
            Ok(stats) => {
                tracing::info!(
                    jobs = stats.jobs,
                    sent = stats.sent,
                    failed = stats.failed,
                    "notification worker drained"
                );
                stats
            }
            Err(err) => {
                tracing::error!(error = %err, "notification worker terminated abnormally");
                WorkerStats::default()
            }
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<NotificationJob>,
    dispatcher: Arc<NotificationDispatcher>,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while let Some(job) = rx.recv().await {
        let result = dispatcher.send(&job.payload, &job.recipients).await;
        stats.jobs += 1;
        stats.sent += result.sent;
        stats.failed += result.failed;
    }

    tracing::debug!("notification channel closed");
    stats
}
