//! Mock executor for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::ports::{ExecutionOutcome, ExecutionRequest, Executor, ExecutorError};

/// One scripted reaction to an execute call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this outcome
    Outcome(ExecutionOutcome),
    /// Return this error
    Error(ExecutorError),
    /// Never return
    Hang,
    /// Panic with this message
    Panic(String),
}

impl MockResponse {
    pub fn success(output: serde_json::Value) -> Self {
        Self::Outcome(ExecutionOutcome::success(output))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Outcome(ExecutionOutcome::failure(error))
    }
}

/// Mock executor for testing.
///
/// Each task id can be given a queue of responses consumed one per call;
/// once a queue is empty the default response is used.
pub struct MockExecutor {
    default_response: MockResponse,
    scripts: Arc<RwLock<HashMap<String, VecDeque<MockResponse>>>>,
    calls: Arc<RwLock<Vec<ExecutionRequest>>>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::with_response(MockResponse::success(serde_json::json!(
            "Mock task completed successfully."
        )))
    }

    pub fn with_default(outcome: ExecutionOutcome) -> Self {
        Self::with_response(MockResponse::Outcome(outcome))
    }

    pub fn with_response(response: MockResponse) -> Self {
        Self {
            default_response: response,
            scripts: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue responses for a task id, consumed in order.
    pub async fn set_responses_for_task(&self, task_id: impl Into<String>, responses: Vec<MockResponse>) {
        let mut scripts = self.scripts.write().await;
        scripts.entry(task_id.into()).or_default().extend(responses);
    }

    async fn next_response(&self, task_id: &str) -> MockResponse {
        let mut scripts = self.scripts.write().await;
        scripts
            .get_mut(task_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_response.clone())
    }

    /// Every request received, in call order.
    pub async fn calls(&self) -> Vec<ExecutionRequest> {
        self.calls.read().await.clone()
    }

    /// Number of calls made for one task id.
    pub async fn call_count(&self, task_id: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|r| r.task_id == task_id)
            .count()
    }

    /// Highest number of calls observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutorError> {
        let response = self.next_response(&request.task_id).await;
        self.calls.write().await.push(request);

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match response {
            MockResponse::Outcome(outcome) => Ok(outcome),
            MockResponse::Error(err) => Err(err),
            MockResponse::Hang => std::future::pending().await,
            MockResponse::Panic(message) => {
                self.active.fetch_sub(1, Ordering::SeqCst);
                panic!("{message}");
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(task_id: &str) -> ExecutionRequest {
        ExecutionRequest {
            task_id: task_id.to_string(),
            executor_ref: "mock".to_string(),
            title: task_id.to_string(),
            description: String::new(),
            input: serde_json::Value::Null,
            attempt: 1,
        }
    }

    #[tokio::test]
    async fn test_scripted_responses_then_default() {
        let executor = MockExecutor::new();
        executor
            .set_responses_for_task(
                "a",
                vec![
                    MockResponse::failure("first"),
                    MockResponse::Error(ExecutorError::Failed("second".into())),
                ],
            )
            .await;

        let first = executor.execute(request("a")).await.unwrap();
        assert!(!first.success);
        assert!(executor.execute(request("a")).await.is_err());
        let third = executor.execute(request("a")).await.unwrap();
        assert!(third.success);
        assert_eq!(third.output, json!("Mock task completed successfully."));

        assert_eq!(executor.call_count("a").await, 3);
        assert_eq!(executor.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_peak_concurrency_tracked() {
        let executor = Arc::new(MockExecutor::new().with_delay(Duration::from_millis(20)));
        let a = tokio::spawn({
            let executor = Arc::clone(&executor);
            async move { executor.execute(request("a")).await }
        });
        let b = tokio::spawn({
            let executor = Arc::clone(&executor);
            async move { executor.execute(request("b")).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(executor.peak_concurrency(), 2);
    }
}
