//! Service layer: the task graph, its driver, and their helpers.

pub mod dependency_resolver;
pub mod execution_driver;
pub mod executor_registry;
pub mod notification;
pub mod task_graph;

pub use dependency_resolver::{DependencyResolver, PlanReport};
pub use execution_driver::{
    select_final_output, CancelHandle, DriverConfig, ExecutionDriver, RunOutcome, RunStatus,
};
pub use executor_registry::ExecutorRegistry;
pub use notification::{BroadcastNotifier, NotificationDispatcher, TaskEvent};
pub use task_graph::TaskGraph;
