//! Notifier port - sink for task progress updates (UI broadcast and the like).

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::models::Task;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    ChannelClosed,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Receives a snapshot every time a task changes.
///
/// Callers never let an error from here reach the task graph; failures are
/// logged and dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_task_updated(&self, task: Task) -> Result<(), NotifyError>;
}

/// Notifier that discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn on_task_updated(&self, _task: Task) -> Result<(), NotifyError> {
        Ok(())
    }
}
