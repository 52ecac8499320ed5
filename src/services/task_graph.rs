//! In-memory task graph: dependency-aware queries and the task status machine.
//!
//! The graph owns every [`Task`]; all queries hand out clones so callers can
//! never observe a task being mutated underneath them. Nothing here performs
//! I/O. Mutations return the updated snapshot and leave notification to the
//! caller.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ExecutionSummary, Plan, Progress, Task, TaskDefinition, TaskResult, TaskStatus, TaskSummary,
    TaskUpdate,
};

/// Collection of tasks for one orchestration run.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    goal: String,
    session_id: String,
    created_at: DateTime<Utc>,
    default_max_retries: u32,
    tasks: HashMap<String, Task>,
    /// Insertion order, for deterministic listing and ready-task tiebreaks
    order: Vec<String>,
    next_sequence: u64,
    /// Ids in the order they first entered `InProgress`
    execution_order: Vec<String>,
    started: HashSet<String>,
}

impl TaskGraph {
    /// Default retry budget for tasks built from definitions without one.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn new(goal: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            session_id: session_id.into(),
            created_at: Utc::now(),
            default_max_retries: Self::DEFAULT_MAX_RETRIES,
            tasks: HashMap::new(),
            order: Vec::new(),
            next_sequence: 0,
            execution_order: Vec::new(),
            started: HashSet::new(),
        }
    }

    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Build a graph from a plan. Dependencies are not checked for existence.
    pub fn from_plan(plan: Plan, default_max_retries: u32) -> DomainResult<Self> {
        let session_id = plan
            .session_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut graph =
            Self::new(plan.goal, session_id).with_default_max_retries(default_max_retries);
        for def in plan.tasks {
            graph.add_definition(def, None)?;
        }
        Ok(graph)
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Tasks in insertion order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub(crate) fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Snapshot of every task in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        self.iter().cloned().collect()
    }

    /// Insert a task in `NotStarted` state and return its id.
    ///
    /// `depends_on` may name tasks that do not exist yet.
    pub fn add_task(&mut self, mut task: Task) -> DomainResult<String> {
        task.validate().map_err(DomainError::ValidationFailed)?;
        if self.tasks.contains_key(&task.id) {
            return Err(DomainError::DuplicateTask(task.id));
        }

        task.status = TaskStatus::NotStarted;
        task.sequence = self.next_sequence;
        self.next_sequence += 1;

        let id = task.id.clone();
        debug!(task_id = %id, executor_ref = %task.executor_ref, deps = ?task.depends_on, "task added");
        self.order.push(id.clone());
        self.tasks.insert(id.clone(), task);
        Ok(id)
    }

    /// Build a task from a definition and insert it.
    pub fn add_definition(
        &mut self,
        def: TaskDefinition,
        parent_id: Option<&str>,
    ) -> DomainResult<String> {
        let mut task = Task::from_definition(def, self.default_max_retries);
        task.parent_id = parent_id.map(str::to_string);
        self.add_task(task)
    }

    pub fn get_task(&self, id: &str) -> Option<Task> {
        self.tasks.get(id).cloned()
    }

    /// Like [`get_task`](Self::get_task) but unknown ids are an error.
    pub fn require_task(&self, id: &str) -> DomainResult<Task> {
        self.get_task(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))
    }

    fn task_ref(&self, id: &str) -> DomainResult<&Task> {
        self.tasks
            .get(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))
    }

    /// Dispatchable status and every dependency completed.
    ///
    /// A dependency id that is not in the graph keeps the task unready.
    pub fn is_ready(&self, task: &Task) -> bool {
        task.status.is_dispatchable()
            && task.depends_on.iter().all(|dep| {
                self.tasks
                    .get(dep)
                    .is_some_and(|d| d.status == TaskStatus::Completed)
            })
    }

    /// Ready tasks, highest priority first, insertion order among equals.
    pub fn get_ready_tasks(&self) -> Vec<Task> {
        let mut ready: Vec<Task> = self.iter().filter(|t| self.is_ready(t)).cloned().collect();
        ready.sort_by(|a, b| b.priority.cmp(&a.priority));
        ready
    }

    fn filtered(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Task> {
        self.iter().filter(|t| predicate(t)).cloned().collect()
    }

    pub fn get_in_progress(&self) -> Vec<Task> {
        self.filtered(|t| t.status == TaskStatus::InProgress)
    }

    pub fn get_completed(&self) -> Vec<Task> {
        self.filtered(|t| t.status == TaskStatus::Completed)
    }

    pub fn get_failed(&self) -> Vec<Task> {
        self.filtered(|t| t.status == TaskStatus::Failed)
    }

    pub fn get_retryable(&self) -> Vec<Task> {
        self.filtered(Task::can_retry)
    }

    /// Waiting tasks and dispatchable tasks whose dependencies are not all completed.
    pub fn get_blocked(&self) -> Vec<Task> {
        self.filtered(|t| {
            t.status == TaskStatus::Waiting || (t.status.is_dispatchable() && !self.is_ready(t))
        })
    }

    pub fn has_all_completed(&self) -> bool {
        !self.tasks.is_empty()
            && self
                .tasks
                .values()
                .all(|t| t.status == TaskStatus::Completed)
    }

    pub fn has_terminal_failures(&self) -> bool {
        self.tasks.values().any(Task::is_terminal_failure)
    }

    /// Empty, all completed, or holding a failure with no retries left.
    ///
    /// An empty graph is terminal without being "all completed".
    pub fn is_terminal_state(&self) -> bool {
        self.tasks.is_empty() || self.has_all_completed() || self.has_terminal_failures()
    }

    /// Apply field mutations to a task and return the updated snapshot.
    ///
    /// The update is validated as a whole before anything is written.
    pub fn update_task(&mut self, id: &str, update: TaskUpdate) -> DomainResult<Task> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;

        if let Some(to) = update.status {
            if !task.status.can_transition_to(to) {
                return Err(DomainError::InvalidStateTransition {
                    id: id.to_string(),
                    from: task.status,
                    to,
                });
            }
            if to == TaskStatus::Retrying && task.status == TaskStatus::Failed && !task.can_retry() {
                return Err(DomainError::RetryNotAllowed {
                    id: id.to_string(),
                    status: task.status,
                    retry_count: task.retry_count,
                    max_retries: task.max_retries,
                });
            }
        }
        if let Some(retry_count) = update.retry_count {
            if retry_count < task.retry_count {
                return Err(DomainError::ValidationFailed(format!(
                    "retry_count of task {id} cannot decrease from {} to {retry_count}",
                    task.retry_count
                )));
            }
        }

        let from = task.status;
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(result) = update.result {
            task.result = result;
        }
        if let Some(error) = update.error {
            task.error = error;
        }
        if let Some(retry_count) = update.retry_count {
            task.retry_count = retry_count;
        }
        if let Some(started_at) = update.started_at {
            task.started_at = started_at;
        }
        if let Some(completed_at) = update.completed_at {
            task.completed_at = completed_at;
        }

        let snapshot = task.clone();
        if snapshot.status == TaskStatus::InProgress && self.started.insert(id.to_string()) {
            self.execution_order.push(id.to_string());
        }
        if from != snapshot.status {
            debug!(task_id = %id, from = %from, to = %snapshot.status, "task status changed");
        }
        Ok(snapshot)
    }

    pub fn mark_started(&mut self, id: &str) -> DomainResult<Task> {
        self.update_task(
            id,
            TaskUpdate::new()
                .status(TaskStatus::InProgress)
                .started_at(Utc::now()),
        )
    }

    pub fn mark_completed(&mut self, id: &str, result: TaskResult) -> DomainResult<Task> {
        self.update_task(
            id,
            TaskUpdate::new()
                .status(TaskStatus::Completed)
                .completed_at(Utc::now())
                .result(result),
        )
    }

    /// Record a failure. Whether to retry is the driver's decision.
    pub fn mark_failed(&mut self, id: &str, error: impl Into<String>) -> DomainResult<Task> {
        self.update_task(
            id,
            TaskUpdate::new()
                .status(TaskStatus::Failed)
                .completed_at(Utc::now())
                .error(error),
        )
    }

    /// Re-queue a failed task. Fails unless the task can retry.
    pub fn mark_retry(&mut self, id: &str) -> DomainResult<Task> {
        let task = self.task_ref(id)?;
        if !task.can_retry() {
            return Err(DomainError::RetryNotAllowed {
                id: id.to_string(),
                status: task.status,
                retry_count: task.retry_count,
                max_retries: task.max_retries,
            });
        }
        let next = task.retry_count + 1;
        self.update_task(
            id,
            TaskUpdate::new()
                .status(TaskStatus::Retrying)
                .retry_count(next)
                .clear_error()
                .clear_started_at()
                .clear_completed_at(),
        )
    }

    /// Cancel a task. Dependents are left blocked, not cancelled.
    pub fn mark_cancelled(&mut self, id: &str) -> DomainResult<Task> {
        self.update_task(
            id,
            TaskUpdate::new()
                .status(TaskStatus::Cancelled)
                .completed_at(Utc::now()),
        )
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn get_progress(&self) -> Progress {
        let total = self.tasks.len();
        let mut progress = Progress {
            total,
            completed: 0,
            in_progress: 0,
            failed: 0,
            cancelled: 0,
            pending: 0,
            percentage: 0.0,
            is_terminal: self.is_terminal_state(),
        };
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Completed => progress.completed += 1,
                TaskStatus::InProgress => progress.in_progress += 1,
                TaskStatus::Failed => progress.failed += 1,
                TaskStatus::Cancelled => progress.cancelled += 1,
                TaskStatus::NotStarted | TaskStatus::Waiting | TaskStatus::Retrying => {
                    progress.pending += 1;
                }
            }
        }
        if total > 0 {
            progress.percentage = progress.completed as f64 / total as f64 * 100.0;
        }
        progress
    }

    pub fn get_execution_summary(&self) -> ExecutionSummary {
        let progress = self.get_progress();
        ExecutionSummary {
            goal: self.goal.clone(),
            session_id: self.session_id.clone(),
            created_at: self.created_at,
            total: progress.total,
            completed: progress.completed,
            failed: progress.failed,
            cancelled: progress.cancelled,
            execution_order: self.execution_order.clone(),
            tasks: self.iter().map(TaskSummary::from).collect(),
        }
    }
}
