//! Task domain model.
//!
//! Tasks are discrete units of work dispatched to executors.
//! They form a graph through `depends_on` edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is defined but has never been dispatched
    #[default]
    NotStarted,
    /// Task is parked (e.g. awaiting external input) and is never ready
    Waiting,
    /// Task is currently being executed
    InProgress,
    /// Task failed and has been re-queued for another attempt
    Retrying,
    /// Task completed successfully
    Completed,
    /// Task failed during execution
    Failed,
    /// Task was cancelled
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Waiting => "waiting",
            Self::InProgress => "in_progress",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "not_started" | "pending" => Some(Self::NotStarted),
            "waiting" => Some(Self::Waiting),
            "in_progress" | "running" => Some(Self::InProgress),
            "retrying" => Some(Self::Retrying),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Statuses from which a task may be dispatched (dependencies permitting).
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Retrying)
    }

    /// Check if this status can never change again.
    ///
    /// `Failed` is only final once the retry budget is spent, which this
    /// status-only check cannot see; use [`Task::is_terminal`] for that.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::NotStarted => &[Self::InProgress, Self::Waiting, Self::Cancelled],
            Self::Waiting => &[Self::NotStarted, Self::InProgress, Self::Cancelled],
            Self::Retrying => &[Self::InProgress, Self::Waiting, Self::Cancelled],
            Self::InProgress => &[Self::Completed, Self::Failed, Self::Waiting, Self::Cancelled],
            Self::Failed => &[Self::Retrying, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        *self == new_status || self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output recorded on a task that completed successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Executor output
    pub output: serde_json::Value,
    /// Whether this output carries the run's final answer
    #[serde(default)]
    pub is_final: bool,
}

impl TaskResult {
    pub fn new(output: serde_json::Value) -> Self {
        Self {
            output,
            is_final: false,
        }
    }

    pub fn final_answer(output: serde_json::Value) -> Self {
        Self {
            output,
            is_final: true,
        }
    }

    /// Render the output as text, or `None` when there is nothing usable.
    ///
    /// `null`, empty strings and whitespace-only strings are not usable.
    pub fn usable_text(&self) -> Option<String> {
        match &self.output {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// A task as described by a plan, before the graph owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Plan-local identifier; a UUID is generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Name of the executor that performs the work
    pub executor: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    /// Overrides the graph's default retry budget
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub input: serde_json::Value,
}

impl TaskDefinition {
    pub fn new(title: impl Into<String>, executor: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: String::new(),
            executor: executor.into(),
            depends_on: Vec::new(),
            priority: 0,
            max_retries: None,
            input: serde_json::Value::Null,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }
}

/// A discrete unit of work that can be executed by an executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,
    /// Task that spawned this one during execution
    pub parent_id: Option<String>,
    /// Human-readable title
    pub title: String,
    /// Detailed description/prompt
    pub description: String,
    /// Executor this task is routed to
    pub executor_ref: String,
    /// Task IDs this depends on
    pub depends_on: Vec<String>,
    /// Higher runs first among ready tasks
    pub priority: i32,
    /// Current status
    pub status: TaskStatus,
    /// Retry count
    pub retry_count: u32,
    /// Maximum retries
    pub max_retries: u32,
    /// Payload handed to the executor
    pub input: serde_json::Value,
    /// Set on success
    pub result: Option<TaskResult>,
    /// Set on failure
    pub error: Option<String>,
    /// Insertion sequence within the owning graph
    pub sequence: u64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When execution started
    pub started_at: Option<DateTime<Utc>>,
    /// When execution completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task with a generated id.
    pub fn new(title: impl Into<String>, executor_ref: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, executor_ref)
    }

    /// Create a new task with an explicit id.
    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        executor_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            title: title.into(),
            description: String::new(),
            executor_ref: executor_ref.into(),
            depends_on: Vec::new(),
            priority: 0,
            status: TaskStatus::default(),
            retry_count: 0,
            max_retries: 3,
            input: serde_json::Value::Null,
            result: None,
            error: None,
            sequence: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Build a task from a plan definition.
    pub fn from_definition(def: TaskDefinition, default_max_retries: u32) -> Self {
        let id = def.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut task = Self::with_id(id, def.title, def.executor)
            .with_description(def.description)
            .with_priority(def.priority)
            .with_max_retries(def.max_retries.unwrap_or(default_max_retries))
            .with_input(def.input);
        for dep in def.depends_on {
            task = task.with_dependency(dep);
        }
        task
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a dependency. Duplicates are ignored.
    pub fn with_dependency(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if !self.depends_on.contains(&task_id) {
            self.depends_on.push(task_id);
        }
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Check if task can be retried.
    pub fn can_retry(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry_count < self.max_retries
    }

    /// Failed with no retry budget left.
    pub fn is_terminal_failure(&self) -> bool {
        self.status == TaskStatus::Failed && self.retry_count >= self.max_retries
    }

    /// Check if task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_final() || self.is_terminal_failure()
    }

    /// Validate task.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Task id cannot be empty".to_string());
        }
        if self.title.trim().is_empty() {
            return Err(format!("Task {} title cannot be empty", self.id));
        }
        if self.depends_on.contains(&self.id) {
            return Err(format!("Task {} cannot depend on itself", self.id));
        }
        Ok(())
    }
}

/// Typed field mutations applied through `TaskGraph::update_task`.
///
/// `None` leaves a field untouched. For optional fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub result: Option<Option<TaskResult>>,
    pub error: Option<Option<String>>,
    pub retry_count: Option<u32>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TaskUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn result(mut self, result: TaskResult) -> Self {
        self.result = Some(Some(result));
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(Some(error.into()));
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error = Some(None);
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(Some(at));
        self
    }

    pub fn clear_started_at(mut self) -> Self {
        self.started_at = Some(None);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(Some(at));
        self
    }

    pub fn clear_completed_at(mut self) -> Self {
        self.completed_at = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
