//! Executor that answers every task with its own description.
//!
//! Used by the CLI to dry-run plans. A few input keys shape the outcome:
//! - `fail_times`: fail this many attempts before succeeding
//! - `final`: mark the output as the run's final answer
//! - `subtasks`: task definitions to add to the graph on success

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::models::TaskDefinition;
use crate::domain::ports::{ExecutionOutcome, ExecutionRequest, Executor, ExecutorError};

#[derive(Debug, Clone, Copy, Default)]
pub struct EchoExecutor;

impl EchoExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for EchoExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError> {
        let fail_times = request
            .input
            .get("fail_times")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if u64::from(request.attempt) <= fail_times {
            debug!(task_id = %request.task_id, attempt = request.attempt, "echo executor failing on purpose");
            return Ok(ExecutionOutcome::failure(format!(
                "attempt {} of '{}' failed on purpose",
                request.attempt, request.title
            )));
        }

        let subtasks: Vec<TaskDefinition> = match request.input.get("subtasks") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ExecutorError::Failed(format!("invalid subtasks: {e}")))?,
            None => Vec::new(),
        };

        let text = if request.description.trim().is_empty() {
            request.title.clone()
        } else {
            request.description.clone()
        };
        let mut outcome = ExecutionOutcome::success(Value::String(text)).with_subtasks(subtasks);
        if request.input.get("final").and_then(Value::as_bool) == Some(true) {
            outcome = outcome.as_final();
        }
        Ok(outcome)
    }
}
