//! Executor Registry
//!
//! Routes each task to the executor registered under its `executor_ref`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::ports::{ExecutionOutcome, ExecutionRequest, Executor, ExecutorError};

/// Registry mapping executor names to implementations.
///
/// The registry is itself an [`Executor`], so the driver only ever sees one.
/// An unknown name resolves to the fallback when one is set, otherwise the
/// call fails with [`ExecutorError::UnknownExecutor`].
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn Executor>>,
    fallback: Option<Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor, replacing any previous one with the same name.
    pub fn register(mut self, name: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        self.executors.insert(name.into(), executor);
        self
    }

    /// Executor used when no name matches.
    pub fn with_fallback(mut self, executor: Arc<dyn Executor>) -> Self {
        self.fallback = Some(executor);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Executor>> {
        self.executors
            .get(name)
            .or(self.fallback.as_ref())
            .map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.names())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[async_trait]
impl Executor for ExecutorRegistry {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError> {
        let executor = self
            .get(&request.executor_ref)
            .ok_or_else(|| ExecutorError::UnknownExecutor(request.executor_ref.clone()))?;
        debug!(task_id = %request.task_id, executor_ref = %request.executor_ref, "routing task");
        executor.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::executors::MockExecutor;
    use serde_json::json;

    fn request(executor_ref: &str) -> ExecutionRequest {
        ExecutionRequest {
            task_id: "t".to_string(),
            executor_ref: executor_ref.to_string(),
            title: "T".to_string(),
            description: String::new(),
            input: serde_json::Value::Null,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_routes_by_name() {
        let registry = ExecutorRegistry::new()
            .register(
                "rag",
                Arc::new(MockExecutor::with_default(ExecutionOutcome::success(json!("rag")))),
            )
            .register(
                "chat",
                Arc::new(MockExecutor::with_default(ExecutionOutcome::success(json!("chat")))),
            );

        let outcome = registry.execute(request("chat")).await.unwrap();
        assert_eq!(outcome.output, json!("chat"));
        assert_eq!(registry.names(), vec!["chat".to_string(), "rag".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_executor_is_an_error() {
        let registry = ExecutorRegistry::new();
        let err = registry.execute(request("nobody")).await.unwrap_err();
        assert_eq!(err, ExecutorError::UnknownExecutor("nobody".to_string()));
    }

    #[tokio::test]
    async fn test_fallback_handles_unknown_names() {
        let registry = ExecutorRegistry::new().with_fallback(Arc::new(MockExecutor::with_default(
            ExecutionOutcome::success(json!("fallback")),
        )));
        assert!(!registry.contains("anything"));
        let outcome = registry.execute(request("anything")).await.unwrap();
        assert_eq!(outcome.output, json!("fallback"));
    }
}
