//! CLI command implementations.

pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::models::{Config, Plan};
use crate::infrastructure::config::ConfigLoader;

/// Read and parse a plan file (YAML or JSON).
pub fn load_plan(path: &Path) -> Result<Plan> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan file {}", path.display()))?;
    Plan::parse(&source).with_context(|| format!("Invalid plan file {}", path.display()))
}

/// Load the explicit config file when given, the project config otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}
