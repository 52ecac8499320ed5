//! `validate`: static checks on a plan file without running it.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::load_plan;
use crate::cli::display::{
    action_failure, action_success, label, list_table, output, CommandOutput,
};
use crate::domain::models::Plan;
use crate::services::{DependencyResolver, PlanReport};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Plan file (YAML or JSON)
    pub plan: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub goal: String,
    pub task_count: usize,
    pub valid: bool,
    #[serde(flatten)]
    pub report: PlanReport,
}

impl ValidateOutput {
    pub fn new(plan: &Plan) -> Self {
        let report = DependencyResolver::new().validate_plan(plan);
        Self {
            goal: plan.goal.clone(),
            task_count: plan.tasks.len(),
            valid: report.is_valid(),
            report,
        }
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} {}", label("Goal"), self.goal)];

        if self.valid {
            lines.push(action_success(&format!(
                "Plan is valid: {} tasks in {} levels",
                self.task_count,
                self.report.levels.len()
            )));
            let mut table = list_table(&["level", "tasks"]);
            for (idx, level) in self.report.levels.iter().enumerate() {
                table.add_row(vec![(idx + 1).to_string(), level.join(", ")]);
            }
            lines.push(table.to_string());
            return lines.join("\n");
        }

        lines.push(action_failure("Plan is invalid"));
        for id in &self.report.duplicate_ids {
            lines.push(format!("  duplicate task id {id}"));
        }
        for (task, dep) in &self.report.missing_dependencies {
            lines.push(format!("  {task} depends on missing task {dep}"));
        }
        if let Some(cycle) = &self.report.cycle {
            lines.push(format!("  dependency cycle {}", cycle.join(" -> ")));
        }
        lines.join("\n")
    }
}

/// Execute the `validate` command.
pub fn execute(args: &ValidateArgs, json: bool) -> Result<()> {
    let plan = load_plan(&args.plan)?;
    let result = ValidateOutput::new(&plan);
    output(&result, json);
    anyhow::ensure!(result.valid, "plan {} is invalid", args.plan.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskDefinition;

    fn def(id: &str, deps: &[&str]) -> TaskDefinition {
        deps.iter().fold(
            TaskDefinition::new(id, "echo").with_id(id),
            |def, dep| def.with_dependency(*dep),
        )
    }

    #[test]
    fn test_valid_plan_lists_levels() {
        let plan = Plan::new("goal")
            .with_task(def("a", &[]))
            .with_task(def("b", &["a"]))
            .with_task(def("c", &["a"]));
        let result = ValidateOutput::new(&plan);
        assert!(result.valid);
        assert_eq!(result.report.levels.len(), 2);
        assert!(result.to_human().contains("3 tasks in 2 levels"));
    }

    #[test]
    fn test_invalid_plan_lists_problems() {
        let plan = Plan::new("goal")
            .with_task(def("a", &["b"]))
            .with_task(def("b", &["a"]))
            .with_task(def("c", &["ghost"]));
        let result = ValidateOutput::new(&plan);
        assert!(!result.valid);
        let rendered = result.to_human();
        assert!(rendered.contains("c depends on missing task ghost"));
        assert!(rendered.contains("dependency cycle"));
    }

    #[test]
    fn test_json_output_flattens_report() {
        let plan = Plan::new("goal").with_task(def("a", &["ghost"]));
        let value = ValidateOutput::new(&plan).to_json();
        assert_eq!(value["valid"], false);
        assert_eq!(value["missing_dependencies"][0][1], "ghost");
    }
}
