//! Domain layer for the task graph
//!
//! This module contains core models, errors and the ports the core depends on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
