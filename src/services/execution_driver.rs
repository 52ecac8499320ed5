//! Execution driver: runs a task graph to a terminal state.
//!
//! The driver repeatedly asks the graph for ready tasks, dispatches them to an
//! [`Executor`] on a bounded [`JoinSet`], and folds each outcome back into the
//! graph. Failures are retried with exponential backoff while the task's
//! budget allows. Every snapshot the graph returns is forwarded to the
//! [`Notifier`] through a [`NotificationDispatcher`].

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Config, ExecutionSummary, TaskResult, TaskStatus};
use crate::domain::ports::{ExecutionOutcome, ExecutionRequest, Executor, ExecutorError, Notifier};
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::notification::NotificationDispatcher;
use crate::services::task_graph::TaskGraph;

/// Configuration for the execution driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Maximum dispatches in flight at once.
    pub max_concurrency: usize,
    /// Upper bound on graph size, including dynamically added tasks.
    pub max_tasks: usize,
    /// How long to wait for in-flight work before re-checking the graph.
    pub poll_interval: Duration,
    /// Per-dispatch timeout. `None` disables it.
    pub task_timeout: Option<Duration>,
    /// Delay before the first retry; doubles per retry.
    pub initial_backoff: Duration,
    /// Cap on the retry delay.
    pub max_backoff: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl DriverConfig {
    pub fn from_config(config: &Config) -> Self {
        let driver = &config.driver;
        Self {
            max_concurrency: driver.max_concurrency,
            max_tasks: driver.max_tasks,
            poll_interval: Duration::from_millis(driver.poll_interval_ms),
            task_timeout: (driver.task_timeout_secs > 0)
                .then(|| Duration::from_secs(driver.task_timeout_secs)),
            initial_backoff: Duration::from_millis(config.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.retry.max_backoff_ms),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Delay before retrying a task that has already been retried
    /// `retry_count` times: `initial * 2^retry_count`, capped at the maximum.
    pub fn retry_delay(&self, retry_count: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry_count).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task completed.
    Completed,
    /// At least one task failed with no retries left.
    Failed { failed_tasks: Vec<String> },
    /// Cancelled through a [`CancelHandle`], or settled with cancelled tasks.
    Cancelled,
    /// The graph held no tasks.
    Empty,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled => "cancelled",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed { failed_tasks } => write!(f, "failed ({})", failed_tasks.join(", ")),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result of [`ExecutionDriver::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub final_output: Option<String>,
    pub summary: ExecutionSummary,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Requests cancellation of the current (or next) run of a driver.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Why the dispatch loop stopped.
enum LoopExit {
    Terminal,
    Settled,
    Cancelled,
}

type Dispatched = (String, Result<ExecutionOutcome, ExecutorError>);
type Joined = Result<(Id, Dispatched), JoinError>;

/// Per-run bookkeeping that lives outside the graph.
struct RunState {
    in_flight: JoinSet<Dispatched>,
    /// Join id -> task id of every dispatch in `in_flight`
    owned: HashMap<Id, String>,
    /// Failed task id -> when its retry is due
    retries: HashMap<String, Instant>,
    dispatcher: NotificationDispatcher,
}

/// Drives a [`TaskGraph`] to completion.
pub struct ExecutionDriver {
    executor: Arc<dyn Executor>,
    notifier: Arc<dyn Notifier>,
    config: DriverConfig,
    cancel: Arc<watch::Sender<bool>>,
}

impl ExecutionDriver {
    pub fn new(
        executor: Arc<dyn Executor>,
        notifier: Arc<dyn Notifier>,
        config: DriverConfig,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            executor,
            notifier,
            config,
            cancel: Arc::new(cancel),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel),
        }
    }

    /// Run the graph until it is terminal, deadlocked, or cancelled.
    ///
    /// Deadlock and capacity overflow are errors; terminal failures are a
    /// [`RunStatus::Failed`] outcome.
    pub async fn run(&self, graph: Arc<RwLock<TaskGraph>>) -> DomainResult<RunOutcome> {
        let span = {
            let g = graph.read().await;
            info_span!("run", goal = %g.goal(), session_id = %g.session_id(), tasks = g.len())
        };
        let result = self.run_inner(&graph).instrument(span).await;
        self.cancel.send_replace(false);
        result
    }

    async fn run_inner(&self, graph: &RwLock<TaskGraph>) -> DomainResult<RunOutcome> {
        {
            let g = graph.read().await;
            if g.len() > self.config.max_tasks {
                return Err(DomainError::CapacityExceeded {
                    limit: self.config.max_tasks,
                });
            }
        }
        info!(
            max_concurrency = self.config.max_concurrency,
            "starting task graph run"
        );

        let mut state = RunState {
            in_flight: JoinSet::new(),
            owned: HashMap::new(),
            retries: HashMap::new(),
            dispatcher: NotificationDispatcher::spawn(Arc::clone(&self.notifier)),
        };

        let exit = self.drive(graph, &mut state).await;
        self.drain(graph, &mut state).await;

        let outcome = match exit {
            Ok(exit) => self.finish(graph, &state, exit).await,
            Err(e) => Err(e),
        };

        let failures = state.dispatcher.shutdown().await;
        if failures > 0 {
            warn!(failures, "some task notifications were not delivered");
        }

        match &outcome {
            Ok(outcome) => info!(status = %outcome.status, "task graph run finished"),
            Err(e) => error!(error = %e, "task graph run aborted"),
        }
        outcome
    }

    async fn drive(&self, graph: &RwLock<TaskGraph>, state: &mut RunState) -> DomainResult<LoopExit> {
        let mut cancel_rx = self.cancel.subscribe();
        let max_concurrency = self.config.max_concurrency.max(1);

        loop {
            if *cancel_rx.borrow_and_update() {
                info!("cancellation requested, stopping dispatch");
                return Ok(LoopExit::Cancelled);
            }

            self.adopt_unowned(graph, state).await?;
            self.promote_due_retries(graph, state).await?;

            let (terminal, ready, in_progress) = {
                let g = graph.read().await;
                (
                    g.is_terminal_state(),
                    g.get_ready_tasks(),
                    g.get_in_progress().len(),
                )
            };
            if terminal {
                return Ok(LoopExit::Terminal);
            }

            let capacity = max_concurrency.saturating_sub(state.in_flight.len());
            if !ready.is_empty() && capacity > 0 {
                let mut g = graph.write().await;
                for task in ready.into_iter().take(capacity) {
                    let snapshot = g.mark_started(&task.id)?;
                    debug!(task_id = %snapshot.id, executor = %snapshot.executor_ref, attempt = snapshot.retry_count + 1, "dispatching task");
                    let request = ExecutionRequest::from(&snapshot);
                    state.dispatcher.emit(snapshot);
                    let handle = state.in_flight.spawn(dispatch(
                        Arc::clone(&self.executor),
                        request,
                        self.config.task_timeout,
                    ));
                    state.owned.insert(handle.id(), task.id);
                }
                continue;
            }

            let next_retry = state.retries.values().min().copied();

            if !state.in_flight.is_empty() {
                let wait = next_retry.map_or(self.config.poll_interval, |due| {
                    due.saturating_duration_since(Instant::now())
                        .min(self.config.poll_interval)
                });
                tokio::select! {
                    joined = state.in_flight.join_next_with_id() => {
                        if let Some(joined) = joined {
                            self.fold(graph, state, joined, true).await?;
                        }
                    }
                    () = tokio::time::sleep(wait) => {}
                    _ = cancel_rx.changed() => {}
                }
                continue;
            }

            if in_progress > 0 {
                // Started by another writer since this turn began; failed next turn.
                continue;
            }

            if let Some(due) = next_retry {
                tokio::select! {
                    () = tokio::time::sleep_until(due) => {}
                    _ = cancel_rx.changed() => {}
                }
                continue;
            }

            let blocked = DependencyResolver::new().diagnose_blocked(&*graph.read().await);
            if blocked.is_empty() {
                return Ok(LoopExit::Settled);
            }
            error!(blocked = blocked.len(), "no task can make progress");
            return Err(DomainError::DependencyDeadlock { blocked });
        }
    }

    /// Take over work this run did not start.
    ///
    /// `InProgress` tasks with no dispatch in this run can never finish, so
    /// they are failed. Retryable failures with no scheduled retry are due
    /// immediately.
    async fn adopt_unowned(
        &self,
        graph: &RwLock<TaskGraph>,
        state: &mut RunState,
    ) -> DomainResult<()> {
        let orphaned: Vec<String> = {
            let g = graph.read().await;
            let owned: HashSet<&str> = state.owned.values().map(String::as_str).collect();
            let now = Instant::now();
            for task in g.get_retryable() {
                state.retries.entry(task.id).or_insert(now);
            }
            g.get_in_progress()
                .into_iter()
                .filter(|t| !owned.contains(t.id.as_str()))
                .map(|t| t.id)
                .collect()
        };
        if orphaned.is_empty() {
            return Ok(());
        }

        let mut g = graph.write().await;
        let now = Instant::now();
        for id in orphaned {
            warn!(task_id = %id, "task in progress without a dispatch in this run, marking it failed");
            let snapshot = g.mark_failed(&id, "interrupted: no dispatch owned by this run")?;
            if snapshot.can_retry() {
                state.retries.insert(id, now);
            }
            state.dispatcher.emit(snapshot);
        }
        Ok(())
    }

    async fn promote_due_retries(
        &self,
        graph: &RwLock<TaskGraph>,
        state: &mut RunState,
    ) -> DomainResult<()> {
        let now = Instant::now();
        let due: Vec<String> = state
            .retries
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        if due.is_empty() {
            return Ok(());
        }

        let mut g = graph.write().await;
        for id in due {
            state.retries.remove(&id);
            let snapshot = g.mark_retry(&id)?;
            info!(task_id = %id, retry = snapshot.retry_count, max_retries = snapshot.max_retries, "retrying task");
            state.dispatcher.emit(snapshot);
        }
        Ok(())
    }

    /// Fold one finished dispatch into the graph.
    ///
    /// With `schedule_retries` off (while draining) failed tasks are left
    /// FAILED instead of being queued for another attempt.
    async fn fold(
        &self,
        graph: &RwLock<TaskGraph>,
        state: &mut RunState,
        joined: Joined,
        schedule_retries: bool,
    ) -> DomainResult<()> {
        let (task_id, result) = match joined {
            Ok((join_id, dispatched)) => {
                state.owned.remove(&join_id);
                dispatched
            }
            Err(e) => {
                let Some(task_id) = state.owned.remove(&e.id()) else {
                    error!(error = %e, "untracked dispatch ended abnormally");
                    return Ok(());
                };
                error!(task_id = %task_id, error = %e, "dispatch task ended abnormally");
                let error = ExecutorError::Failed(format!("dispatch ended abnormally: {e}"));
                (task_id, Err(error))
            }
        };

        let mut g = graph.write().await;
        let error = match result {
            Ok(outcome) if outcome.success => {
                let result = TaskResult {
                    output: outcome.output,
                    is_final: outcome.is_final,
                };
                let snapshot = g.mark_completed(&task_id, result)?;
                state.dispatcher.emit(snapshot);

                if !outcome.new_subtasks.is_empty() {
                    if g.len() + outcome.new_subtasks.len() > self.config.max_tasks {
                        return Err(DomainError::CapacityExceeded {
                            limit: self.config.max_tasks,
                        });
                    }
                    for def in outcome.new_subtasks {
                        let id = g.add_definition(def, Some(&task_id))?;
                        info!(parent_id = %task_id, task_id = %id, "added subtask");
                        state.dispatcher.emit(g.require_task(&id)?);
                    }
                }

                let progress = g.get_progress();
                info!(
                    task_id = %task_id,
                    completed = progress.completed,
                    total = progress.total,
                    "task completed"
                );
                return Ok(());
            }
            Ok(outcome) => outcome
                .error
                .unwrap_or_else(|| "executor reported failure".to_string()),
            Err(e) => e.to_string(),
        };

        let snapshot = g.mark_failed(&task_id, &error)?;
        let can_retry = snapshot.can_retry();
        let retry_count = snapshot.retry_count;
        state.dispatcher.emit(snapshot);

        if !can_retry {
            error!(task_id = %task_id, error = %error, "task failed with no retries left");
            return Ok(());
        }
        if !schedule_retries {
            return Ok(());
        }

        let delay = self.config.retry_delay(retry_count);
        warn!(task_id = %task_id, error = %error, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "task failed, retry scheduled");
        if delay.is_zero() {
            let snapshot = g.mark_retry(&task_id)?;
            state.dispatcher.emit(snapshot);
        } else {
            state.retries.insert(task_id, Instant::now() + delay);
        }
        Ok(())
    }

    /// Wait for every in-flight dispatch and fold its result.
    async fn drain(&self, graph: &RwLock<TaskGraph>, state: &mut RunState) {
        if !state.in_flight.is_empty() {
            debug!(in_flight = state.in_flight.len(), "draining in-flight dispatches");
        }
        while let Some(joined) = state.in_flight.join_next_with_id().await {
            if let Err(e) = self.fold(graph, state, joined, false).await {
                warn!(error = %e, "failed to record result while draining");
            }
        }
        state.retries.clear();
    }

    async fn finish(
        &self,
        graph: &RwLock<TaskGraph>,
        state: &RunState,
        exit: LoopExit,
    ) -> DomainResult<RunOutcome> {
        let mut g = graph.write().await;

        let status = if matches!(exit, LoopExit::Cancelled) {
            let pending: Vec<String> = g
                .iter()
                .filter(|t| !t.is_terminal())
                .map(|t| t.id.clone())
                .collect();
            for id in pending {
                state.dispatcher.emit(g.mark_cancelled(&id)?);
            }
            RunStatus::Cancelled
        } else if g.has_all_completed() {
            RunStatus::Completed
        } else if g.has_terminal_failures() {
            let failed_tasks = g
                .iter()
                .filter(|t| t.is_terminal_failure())
                .map(|t| t.id.clone())
                .collect();
            RunStatus::Failed { failed_tasks }
        } else if g.is_empty() {
            RunStatus::Empty
        } else {
            RunStatus::Cancelled
        };

        Ok(RunOutcome {
            status,
            final_output: select_final_output(&g),
            summary: g.get_execution_summary(),
        })
    }
}

/// Pick the run's final answer from completed tasks.
///
/// The most recently started completed task whose result is marked final and
/// carries usable text wins. Otherwise every usable output is joined in
/// execution order, separated by a blank line.
pub fn select_final_output(graph: &TaskGraph) -> Option<String> {
    let completed: Vec<&TaskResult> = graph
        .execution_order()
        .iter()
        .filter_map(|id| graph.task(id))
        .filter(|t| t.status == TaskStatus::Completed)
        .filter_map(|t| t.result.as_ref())
        .collect();

    let chosen = completed
        .iter()
        .rev()
        .filter(|r| r.is_final)
        .find_map(|r| r.usable_text());
    if chosen.is_some() {
        return chosen;
    }

    let outputs: Vec<String> = completed.iter().filter_map(|r| r.usable_text()).collect();
    (!outputs.is_empty()).then(|| outputs.join("\n\n"))
}

/// Call the executor on its own task so a panic surfaces as a [`JoinError`]
/// tied to this task id.
async fn dispatch(
    executor: Arc<dyn Executor>,
    request: ExecutionRequest,
    timeout: Option<Duration>,
) -> Dispatched {
    let task_id = request.task_id.clone();
    let mut call = tokio::spawn(async move { executor.execute(request).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut call).await {
            Ok(joined) => joined,
            Err(_) => {
                call.abort();
                let millis = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                return (task_id, Err(ExecutorError::Timeout { millis }));
            }
        },
        None => call.await,
    };

    let result = match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(ExecutorError::Panicked(panic_message(&*e.into_panic()))),
        Err(e) => Err(ExecutorError::Failed(e.to_string())),
    };
    (task_id, result)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
