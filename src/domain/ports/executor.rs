//! Executor port - interface for whatever performs a task's work.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::{Task, TaskDefinition};

/// Errors an executor can raise instead of returning an outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Execution failed: {0}")]
    Failed(String),

    #[error("No executor registered for '{0}'")]
    UnknownExecutor(String),

    #[error("Execution timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

/// What an executor receives for one attempt at a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub task_id: String,
    pub executor_ref: String,
    pub title: String,
    pub description: String,
    pub input: serde_json::Value,
    /// 1 for the first attempt, incremented per retry
    pub attempt: u32,
}

impl From<&Task> for ExecutionRequest {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            executor_ref: task.executor_ref.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            input: task.input.clone(),
            attempt: task.retry_count + 1,
        }
    }
}

/// Result of one executor call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
    /// Follow-up work to add to the running graph
    #[serde(default)]
    pub new_subtasks: Vec<TaskDefinition>,
    /// Marks `output` as the run's final answer
    #[serde(default)]
    pub is_final: bool,
}

impl ExecutionOutcome {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
            new_subtasks: Vec::new(),
            is_final: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            new_subtasks: Vec::new(),
            is_final: false,
        }
    }

    pub fn with_subtasks(mut self, subtasks: Vec<TaskDefinition>) -> Self {
        self.new_subtasks = subtasks;
        self
    }

    pub fn as_final(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Trait for task executors (LLM agents, tool calls, ...).
///
/// Implementations must tolerate being called again with the same request
/// after a failed attempt.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError>;
}
