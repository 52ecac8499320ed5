//! agent-taskgraph - dependency-aware task graph for multi-agent orchestration
//!
//! An orchestrator turns a user goal into a [`Plan`]: tasks with executors
//! and dependencies. The plan is loaded into a [`TaskGraph`], and an
//! [`ExecutionDriver`] dispatches ready tasks to an [`Executor`] until the
//! graph is terminal, retrying failures and streaming every status change
//! to a [`Notifier`].
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the executor/notifier ports
//! - **Service Layer** (`services`): task graph, execution driver, registry, notification
//! - **Adapters** (`adapters`): built-in executors
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio::sync::RwLock;
//! use agent_taskgraph::adapters::executors::EchoExecutor;
//! use agent_taskgraph::{DriverConfig, ExecutionDriver, NullNotifier, Task, TaskGraph};
//!
//! # async fn example() -> agent_taskgraph::DomainResult<()> {
//! let mut graph = TaskGraph::new("Answer the question", "session-1");
//! let research = graph.add_task(Task::new("Research", "echo"))?;
//! graph.add_task(Task::new("Write answer", "echo").with_dependency(research))?;
//!
//! let driver = ExecutionDriver::new(
//!     Arc::new(EchoExecutor::new()),
//!     Arc::new(NullNotifier),
//!     DriverConfig::default(),
//! );
//! let outcome = driver.run(Arc::new(RwLock::new(graph))).await?;
//! println!("{:?}", outcome.final_output);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    BlockReason, BlockedTask, Config, ExecutionSummary, Plan, Progress, Task, TaskDefinition,
    TaskResult, TaskStatus, TaskUpdate,
};
pub use domain::ports::{
    ExecutionOutcome, ExecutionRequest, Executor, ExecutorError, Notifier, NotifyError,
    NullNotifier,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CancelHandle, DependencyResolver, DriverConfig, ExecutionDriver, ExecutorRegistry,
    RunOutcome, RunStatus, TaskGraph,
};
