//! `run`: execute a plan to completion.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::load_plan;
use crate::adapters::executors::EchoExecutor;
use crate::cli::display::{
    colorize_status, create_spinner, list_table, output, render_list, section_header, truncate,
    CommandOutput,
};
use crate::domain::models::{Config, ExecutionSummary, Task, TaskStatus};
use crate::domain::ports::{Notifier, NotifyError};
use crate::services::{
    DriverConfig, ExecutionDriver, ExecutorRegistry, RunOutcome, RunStatus, TaskGraph,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Plan file (YAML or JSON)
    pub plan: PathBuf,

    /// Override the configured dispatch concurrency
    #[arg(long)]
    pub max_concurrency: Option<usize>,
}

/// Notifier that mirrors task updates onto the spinner.
struct SpinnerNotifier {
    spinner: ProgressBar,
}

#[async_trait]
impl Notifier for SpinnerNotifier {
    async fn on_task_updated(&self, task: Task) -> Result<(), NotifyError> {
        if task.status == TaskStatus::Completed {
            self.spinner.inc(1);
        }
        self.spinner
            .set_message(format!("{} {}", truncate(&task.title, 40), task.status));
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub status: RunStatus,
    pub final_output: Option<String>,
    pub summary: ExecutionSummary,
}

impl From<RunOutcome> for RunOutput {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            status: outcome.status,
            final_output: outcome.final_output,
            summary: outcome.summary,
        }
    }
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let summary = &self.summary;
        let mut table = list_table(&["id", "title", "executor", "status", "retries", "error"]);
        for task in &summary.tasks {
            table.add_row(vec![
                truncate(&task.id, 12),
                truncate(&task.title, 40),
                task.executor_ref.clone(),
                colorize_status(task.status.as_str()).to_string(),
                format!("{}/{}", task.retry_count, task.max_retries),
                task.error.as_deref().map(|e| truncate(e, 50)).unwrap_or_default(),
            ]);
        }

        let mut lines = vec![
            format!(
                "Goal: {}\nStatus: {} ({}/{} completed)",
                summary.goal,
                colorize_status(self.status.as_str()),
                summary.completed,
                summary.total
            ),
            render_list("task", &table, summary.tasks.len()),
        ];
        if let RunStatus::Failed { failed_tasks } = &self.status {
            lines.push(format!("Failed for good: {}", failed_tasks.join(", ")));
        }
        if let Some(final_output) = &self.final_output {
            lines.push(section_header("Final output"));
            lines.push(final_output.clone());
        }
        lines.join("\n")
    }
}

/// Execute the `run` command.
pub async fn execute(args: RunArgs, config: &Config, json: bool) -> Result<()> {
    let plan = load_plan(&args.plan)?;
    let graph = TaskGraph::from_plan(plan, config.retry.max_retries)
        .context("Failed to build task graph from plan")?;

    let mut driver_config = DriverConfig::from_config(config);
    if let Some(max_concurrency) = args.max_concurrency {
        anyhow::ensure!(max_concurrency > 0, "--max-concurrency must be at least 1");
        driver_config = driver_config.with_max_concurrency(max_concurrency);
    }

    let echo = Arc::new(EchoExecutor::new());
    let registry = ExecutorRegistry::new()
        .register("echo", echo.clone())
        .with_fallback(echo);

    let spinner = create_spinner(format!("Running {}", truncate(graph.goal(), 60)), !json);
    spinner.set_length(u64::try_from(graph.len()).unwrap_or(u64::MAX));
    let notifier = Arc::new(SpinnerNotifier {
        spinner: spinner.clone(),
    });

    let driver = ExecutionDriver::new(Arc::new(registry), notifier, driver_config);
    let cancel = driver.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let result = driver.run(Arc::new(RwLock::new(graph))).await;
    interrupt.abort();
    spinner.finish_and_clear();

    let outcome = result.context("Run aborted")?;
    let succeeded = outcome.is_success() || outcome.status == RunStatus::Empty;
    let status = outcome.status.clone();
    output(&RunOutput::from(outcome), json);

    anyhow::ensure!(succeeded, "run finished with status {status}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskResult;
    use crate::services::select_final_output;
    use serde_json::json;

    fn finished_output() -> RunOutput {
        let mut graph = TaskGraph::new("Say hi", "s-1");
        graph.add_task(Task::with_id("greet", "Greet", "echo")).unwrap();
        graph.mark_started("greet").unwrap();
        graph
            .mark_completed("greet", TaskResult::final_answer(json!("hello there")))
            .unwrap();
        RunOutput {
            status: RunStatus::Completed,
            final_output: select_final_output(&graph),
            summary: graph.get_execution_summary(),
        }
    }

    #[test]
    fn test_human_output_lists_tasks_and_answer() {
        let rendered = finished_output().to_human();
        assert!(rendered.contains("Goal: Say hi"));
        assert!(rendered.contains("greet"));
        assert!(rendered.contains("Final output"));
        assert!(rendered.contains("hello there"));
    }

    #[test]
    fn test_json_output_shape() {
        let value = finished_output().to_json();
        assert_eq!(value["status"]["kind"], "completed");
        assert_eq!(value["final_output"], "hello there");
        assert_eq!(value["summary"]["total"], 1);
    }

    #[tokio::test]
    async fn test_execute_runs_plan_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "goal: Say hi\ntasks:\n  - id: a\n    title: A\n    executor: echo\n  - id: b\n    title: B\n    executor: anything\n    depends_on: [a]"
        )
        .unwrap();

        let args = RunArgs {
            plan: file.path().to_path_buf(),
            max_concurrency: Some(1),
        };
        execute(args, &Config::default(), true).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_rejects_zero_concurrency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"goal: g\ntasks: []\n").unwrap();
        let args = RunArgs {
            plan: file.path().to_path_buf(),
            max_concurrency: Some(0),
        };
        let err = execute(args, &Config::default(), true).await.unwrap_err();
        assert!(err.to_string().contains("--max-concurrency"));
    }
}
