//! Domain errors for the task graph and its execution driver.

use thiserror::Error;

use super::models::{BlockedTask, TaskStatus};
use super::ports::ExecutorError;

/// Format blocked tasks as `a (missing dependency ghost), b (...)`.
fn format_blocked(blocked: &[BlockedTask]) -> String {
    blocked
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Domain-level errors that can occur while building or driving a task graph.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Invalid state transition for task {id} from {from} to {to}")]
    InvalidStateTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error(
        "Task {id} cannot be retried: status {status}, retry count {retry_count} of max {max_retries}"
    )]
    RetryNotAllowed {
        id: String,
        status: TaskStatus,
        retry_count: u32,
        max_retries: u32,
    },

    #[error("Dependency deadlock, no task can make progress: {}", format_blocked(.blocked))]
    DependencyDeadlock { blocked: Vec<BlockedTask> },

    #[error("Executor failed for task {task_id}: {source}")]
    ExecutorFailure {
        task_id: String,
        #[source]
        source: ExecutorError,
    },

    #[error("Task graph capacity of {limit} tasks exceeded")]
    CapacityExceeded { limit: usize },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::BlockReason;

    #[test]
    fn test_deadlock_message_lists_blocked_tasks() {
        let err = DomainError::DependencyDeadlock {
            blocked: vec![
                BlockedTask {
                    task_id: "c".to_string(),
                    reason: BlockReason::MissingDependency("ghost".to_string()),
                },
                BlockedTask {
                    task_id: "d".to_string(),
                    reason: BlockReason::Waiting,
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("c (missing dependency ghost)"));
        assert!(message.contains("d (waiting)"));
    }

    #[test]
    fn test_executor_failure_keeps_source() {
        let err = DomainError::ExecutorFailure {
            task_id: "a".to_string(),
            source: ExecutorError::Timeout { millis: 5000 },
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("timed out after 5000ms"));
    }
}
