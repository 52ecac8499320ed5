pub mod config;
pub mod plan;
pub mod summary;
pub mod task;

pub use config::{Config, DriverSettings, LoggingConfig, RetryConfig};
pub use plan::Plan;
pub use summary::{BlockReason, BlockedTask, ExecutionSummary, Progress, TaskSummary};
pub use task::{Task, TaskDefinition, TaskResult, TaskStatus, TaskUpdate};
