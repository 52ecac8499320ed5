//! Fire-and-forget delivery of task snapshots to a [`Notifier`].
//!
//! The driver hands snapshots to a [`NotificationDispatcher`], which queues
//! them on an unbounded channel and delivers them from a background worker in
//! the order they were emitted. Delivery failures are logged and counted,
//! never propagated back into the graph.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::domain::models::Task;
use crate::domain::ports::{Notifier, NotifyError};

/// Queues snapshots for a notifier without making the caller wait on it.
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<Task>,
    worker: JoinHandle<()>,
    failures: Arc<AtomicU64>,
}

impl NotificationDispatcher {
    /// Start the delivery worker. Must be called inside a tokio runtime.
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let failures = Arc::new(AtomicU64::new(0));
        let worker_failures = Arc::clone(&failures);

        let worker = tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let task_id = task.id.clone();
                let status = task.status;
                if let Err(e) = notifier.on_task_updated(task).await {
                    worker_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(task_id = %task_id, status = %status, error = %e, "task notification failed");
                }
            }
        });

        Self {
            tx,
            worker,
            failures,
        }
    }

    /// Queue a snapshot for delivery.
    pub fn emit(&self, task: Task) {
        if let Err(e) = self.tx.send(task) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(task_id = %e.0.id, "notification worker stopped, dropping update");
        }
    }

    /// Deliveries that failed so far.
    pub fn failed_deliveries(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver everything queued, then stop the worker.
    ///
    /// Returns the total number of failed deliveries.
    pub async fn shutdown(self) -> u64 {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "notification worker ended abnormally");
        }
        self.failures.load(Ordering::Relaxed)
    }
}

/// A task snapshot stamped with a per-notifier sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub task: Task,
}

/// Notifier that republishes snapshots on a broadcast channel.
///
/// Having no subscribers is not an error.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<TaskEvent>,
    sequence: AtomicU64,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn on_task_updated(&self, task: Task) -> Result<(), NotifyError> {
        let event = TaskEvent {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            timestamp: Utc::now(),
            task,
        };
        let _ = self.sender.send(event);
        Ok(())
    }
}
