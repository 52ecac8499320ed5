//! Port trait definitions (Hexagonal Architecture)
//!
//! The orchestration core consumes two collaborators it does not implement:
//! - Executor: performs the work behind a task
//! - Notifier: receives task snapshots for progress streaming

pub mod executor;
pub mod notifier;

pub use executor::{ExecutionOutcome, ExecutionRequest, Executor, ExecutorError};
pub use notifier::{Notifier, NotifyError, NullNotifier};
