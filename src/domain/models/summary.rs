//! Progress snapshots, end-of-run summaries and blocked-task diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Task, TaskStatus};

/// Aggregate progress of a task graph at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    /// All failed tasks, retryable or not
    pub failed: usize,
    pub cancelled: usize,
    /// Not started, waiting or retrying
    pub pending: usize,
    /// Completed share in percent; 0.0 for an empty graph
    pub percentage: f64,
    pub is_terminal: bool,
}

/// Per-task row of an [`ExecutionSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub executor_ref: String,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskSummary {
    fn is_terminal_failure(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry_count >= self.max_retries
    }
}

impl From<&Task> for TaskSummary {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            executor_ref: task.executor_ref.clone(),
            status: task.status,
            retry_count: task.retry_count,
            max_retries: task.max_retries,
            error: task.error.clone(),
            started_at: task.started_at,
            completed_at: task.completed_at,
        }
    }
}

/// End-of-run report. Meant for reporting, not for control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub goal: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Task ids in the order they first started
    pub execution_order: Vec<String>,
    pub tasks: Vec<TaskSummary>,
}

impl ExecutionSummary {
    /// Same verdict as `TaskGraph::has_all_completed`, derived from the summary alone.
    pub fn has_all_completed(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    /// Same verdict as `TaskGraph::has_terminal_failures`, derived from the summary alone.
    pub fn has_terminal_failures(&self) -> bool {
        self.tasks.iter().any(TaskSummary::is_terminal_failure)
    }

    /// Ids of tasks that failed with no retry budget left.
    pub fn terminal_failures(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| t.is_terminal_failure())
            .map(|t| t.id.clone())
            .collect()
    }
}

/// Why a non-terminal task cannot make progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum BlockReason {
    /// Depends on an id that is not in the graph
    MissingDependency(String),
    /// Depends on a task that failed with no retries left
    FailedDependency(String),
    /// Depends on a cancelled task
    CancelledDependency(String),
    /// Part of a dependency cycle
    Cycle(Vec<String>),
    /// Parked in the waiting state
    Waiting,
    /// Depends on a task that is itself blocked
    BlockedBy(String),
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDependency(id) => write!(f, "missing dependency {id}"),
            Self::FailedDependency(id) => write!(f, "dependency {id} failed"),
            Self::CancelledDependency(id) => write!(f, "dependency {id} cancelled"),
            Self::Cycle(path) => write!(f, "dependency cycle {}", path.join(" -> ")),
            Self::Waiting => write!(f, "waiting"),
            Self::BlockedBy(id) => write!(f, "blocked by {id}"),
        }
    }
}

/// A task that cannot make progress, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedTask {
    pub task_id: String,
    pub reason: BlockReason,
}

impl std::fmt::Display for BlockedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.task_id, self.reason)
    }
}
