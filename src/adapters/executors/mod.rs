//! Executor adapter implementations.

pub mod echo;
pub mod mock;

pub use echo::EchoExecutor;
pub use mock::{MockExecutor, MockResponse};
