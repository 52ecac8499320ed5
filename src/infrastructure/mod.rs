//! Infrastructure layer module
//!
//! Configuration loading and logging setup. Nothing in the domain or service
//! layers depends on this module.

pub mod config;
pub mod logging;
