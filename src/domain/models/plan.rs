//! Execution plan as produced by an orchestrator: a goal plus task definitions.

use serde::{Deserialize, Serialize};

use super::task::TaskDefinition;
use crate::domain::errors::{DomainError, DomainResult};

/// A plan to be loaded into a `TaskGraph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// What the run is trying to achieve
    pub goal: String,
    /// Chat session the run belongs to; generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

impl Plan {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            session_id: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(task);
        self
    }

    /// Parse a plan from YAML. JSON documents are accepted too.
    pub fn parse(source: &str) -> DomainResult<Self> {
        let plan: Self = serde_yaml::from_str(source)
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;
        if plan.goal.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "Plan goal cannot be empty".to_string(),
            ));
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_plan() {
        let yaml = r"
goal: Answer the question
session_id: s-1
tasks:
  - id: search
    title: Search the knowledge base
    executor: rag
    priority: 2
  - id: answer
    title: Compose the answer
    executor: chat
    depends_on: [search]
";
        let plan = Plan::parse(yaml).unwrap();
        assert_eq!(plan.goal, "Answer the question");
        assert_eq!(plan.session_id.as_deref(), Some("s-1"));
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[1].depends_on, vec!["search".to_string()]);
    }

    #[test]
    fn test_parse_json_plan() {
        let json = r#"{"goal": "g", "tasks": [{"title": "t", "executor": "e"}]}"#;
        let plan = Plan::parse(json).unwrap();
        assert!(plan.session_id.is_none());
        assert_eq!(plan.tasks[0].executor, "e");
    }

    #[test]
    fn test_parse_rejects_empty_goal() {
        assert!(matches!(
            Plan::parse("goal: ''\n"),
            Err(DomainError::ValidationFailed(_))
        ));
        assert!(matches!(
            Plan::parse("tasks: [1, 2"),
            Err(DomainError::SerializationError(_))
        ));
    }
}
