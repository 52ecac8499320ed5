//! Common test utilities for integration tests
//!
//! Shared fixtures and helpers used across the integration test files.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use agent_taskgraph::{DriverConfig, Task, TaskGraph};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use agent_taskgraph::{Notifier, NotifyError, TaskStatus};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Wait for a condition to be true with timeout
///
/// Polls the predicate every 10ms until it returns true or the timeout is
/// reached.
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}

/// Driver settings that keep tests fast: short polls, no backoff.
pub fn fast_config() -> DriverConfig {
    DriverConfig {
        max_concurrency: 4,
        max_tasks: 128,
        poll_interval: Duration::from_millis(5),
        task_timeout: Some(Duration::from_secs(5)),
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    }
}

/// Graph with one task per `(id, dependencies)` pair, inserted in order.
pub fn graph_of(tasks: &[(&str, &[&str])]) -> TaskGraph {
    let mut graph = TaskGraph::new("integration goal", "session-test");
    for (id, deps) in tasks {
        let task = deps
            .iter()
            .fold(Task::with_id(*id, *id, "mock"), |t, dep| t.with_dependency(*dep));
        graph.add_task(task).expect("task should insert");
    }
    graph
}

pub fn shared(graph: TaskGraph) -> Arc<RwLock<TaskGraph>> {
    Arc::new(RwLock::new(graph))
}

/// Notifier that records every snapshot it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    updates: Mutex<Vec<Task>>,
}

impl RecordingNotifier {
    pub async fn updates(&self) -> Vec<Task> {
        self.updates.lock().await.clone()
    }

    /// Statuses seen for one task, in delivery order.
    pub async fn statuses_for(&self, task_id: &str) -> Vec<TaskStatus> {
        self.updates
            .lock()
            .await
            .iter()
            .filter(|t| t.id == task_id)
            .map(|t| t.status)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn on_task_updated(&self, task: Task) -> Result<(), NotifyError> {
        self.updates.lock().await.push(task);
        Ok(())
    }
}

/// Notifier whose every delivery fails.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn on_task_updated(&self, _task: Task) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("transport down".to_string()))
    }
}
