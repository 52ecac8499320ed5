use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::domain::models::{BlockReason, BlockedTask, Plan, TaskStatus};
use crate::services::task_graph::TaskGraph;

/// Static problems found in a plan before it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// `(task, dependency)` pairs naming ids that are not in the plan
    pub missing_dependencies: Vec<(String, String)>,
    /// Ids defined more than once
    pub duplicate_ids: Vec<String>,
    /// First dependency cycle found, as a closed path
    pub cycle: Option<Vec<String>>,
    /// Tasks grouped into levels that can run in parallel
    pub levels: Vec<Vec<String>>,
}

impl PlanReport {
    pub fn is_valid(&self) -> bool {
        self.missing_dependencies.is_empty() && self.duplicate_ids.is_empty() && self.cycle.is_none()
    }
}

/// Service for resolving task dependencies and explaining why tasks are stuck
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver;

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util(
    node: &str,
    graph: &HashMap<String, Vec<String>>,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> bool {
    visited.insert(node.to_string());
    rec_stack.insert(node.to_string());
    path.push(node.to_string());

    if let Some(neighbors) = graph.get(node) {
        for neighbor in neighbors {
            if !graph.contains_key(neighbor) {
                continue;
            }
            if !visited.contains(neighbor) {
                if detect_cycle_util(neighbor, graph, visited, rec_stack, path) {
                    return true;
                }
            } else if rec_stack.contains(neighbor) {
                if let Some(cycle_start) = path.iter().position(|id| id == neighbor) {
                    path.drain(0..cycle_start);
                    path.push(neighbor.clone());
                    return true;
                }
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    false
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Detect a dependency cycle in an adjacency map of `task -> depends_on`.
    ///
    /// Returns the closed path, e.g. `[a, b, a]`. Edges to unknown ids are ignored.
    pub fn detect_cycle(&self, graph: &HashMap<String, Vec<String>>) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        let mut roots: Vec<&String> = graph.keys().collect();
        roots.sort();
        for task_id in roots {
            if !visited.contains(task_id)
                && detect_cycle_util(task_id, graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(path);
            }
        }
        None
    }

    /// Group tasks into levels: level 0 has no dependencies, level n only
    /// depends on earlier levels. Tasks on a cycle or behind a missing
    /// dependency are left out.
    pub fn execution_levels(&self, graph: &HashMap<String, Vec<String>>, order: &[String]) -> Vec<Vec<String>> {
        let mut placed: HashSet<&str> = HashSet::new();
        let mut levels = Vec::new();

        loop {
            let level: Vec<String> = order
                .iter()
                .filter(|id| !placed.contains(id.as_str()))
                .filter(|id| {
                    graph
                        .get(id.as_str())
                        .is_some_and(|deps| deps.iter().all(|d| placed.contains(d.as_str())))
                })
                .cloned()
                .collect();
            if level.is_empty() {
                break;
            }
            for id in &level {
                if let Some((key, _)) = graph.get_key_value(id.as_str()) {
                    placed.insert(key.as_str());
                }
            }
            levels.push(level);
        }
        levels
    }

    /// Check a plan for missing dependencies, duplicate ids and cycles.
    pub fn validate_plan(&self, plan: &Plan) -> PlanReport {
        let mut report = PlanReport::default();
        let mut graph: HashMap<String, Vec<String>> = HashMap::new();
        let mut order = Vec::new();

        for (idx, def) in plan.tasks.iter().enumerate() {
            let id = def.id.clone().unwrap_or_else(|| format!("#{idx}"));
            if graph.insert(id.clone(), def.depends_on.clone()).is_some() {
                report.duplicate_ids.push(id);
            } else {
                order.push(id);
            }
        }

        for id in &order {
            for dep in &graph[id] {
                if !graph.contains_key(dep) {
                    report.missing_dependencies.push((id.clone(), dep.clone()));
                }
            }
        }

        report.cycle = self.detect_cycle(&graph);
        report.levels = self.execution_levels(&graph, &order);
        report
    }

    /// Explain why every blocked task in the graph cannot start.
    ///
    /// Reasons are checked in order: waiting, cycle, then the first
    /// dependency that is missing, failed for good, cancelled or itself stuck.
    pub fn diagnose_blocked(&self, graph: &TaskGraph) -> Vec<BlockedTask> {
        let adjacency: HashMap<String, Vec<String>> = graph
            .iter()
            .map(|t| (t.id.clone(), t.depends_on.clone()))
            .collect();

        graph
            .get_blocked()
            .into_iter()
            .map(|task| {
                let reason = if task.status == TaskStatus::Waiting {
                    BlockReason::Waiting
                } else if let Some(path) = self.cycle_through(&task.id, &adjacency) {
                    BlockReason::Cycle(path)
                } else {
                    self.dependency_reason(graph, &task.depends_on)
                };
                BlockedTask {
                    task_id: task.id,
                    reason,
                }
            })
            .collect()
    }

    fn dependency_reason(&self, graph: &TaskGraph, depends_on: &[String]) -> BlockReason {
        let mut first_pending = None;
        for dep in depends_on {
            match graph.get_task(dep) {
                None => return BlockReason::MissingDependency(dep.clone()),
                Some(d) if d.is_terminal_failure() => {
                    return BlockReason::FailedDependency(dep.clone());
                }
                Some(d) if d.status == TaskStatus::Cancelled => {
                    return BlockReason::CancelledDependency(dep.clone());
                }
                Some(d) if d.status != TaskStatus::Completed && first_pending.is_none() => {
                    first_pending = Some(dep.clone());
                }
                Some(_) => {}
            }
        }
        BlockReason::BlockedBy(first_pending.unwrap_or_default())
    }

    /// Closed path from `start` back to itself, if `start` lies on a cycle.
    fn cycle_through(&self, start: &str, adjacency: &HashMap<String, Vec<String>>) -> Option<Vec<String>> {
        fn walk(
            node: &str,
            start: &str,
            adjacency: &HashMap<String, Vec<String>>,
            seen: &mut HashSet<String>,
            path: &mut Vec<String>,
        ) -> bool {
            for next in adjacency.get(node).into_iter().flatten() {
                if next == start {
                    path.push(next.clone());
                    return true;
                }
                if adjacency.contains_key(next) && seen.insert(next.clone()) {
                    path.push(next.clone());
                    if walk(next, start, adjacency, seen, path) {
                        return true;
                    }
                    path.pop();
                }
            }
            false
        }

        let mut path = vec![start.to_string()];
        let mut seen = HashSet::new();
        walk(start, start, adjacency, &mut seen, &mut path).then_some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Task, TaskDefinition, TaskResult};

    fn adjacency(edges: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        edges
            .iter()
            .map(|(id, deps)| {
                (
                    (*id).to_string(),
                    deps.iter().map(|d| (*d).to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_detect_cycle() {
        let resolver = DependencyResolver::new();
        let acyclic = adjacency(&[("a", &[]), ("b", &["a"]), ("c", &["a", "b"])]);
        assert!(resolver.detect_cycle(&acyclic).is_none());

        let cyclic = adjacency(&[("a", &["c"]), ("b", &["a"]), ("c", &["b"])]);
        let cycle = resolver.detect_cycle(&cyclic).unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn test_detect_cycle_ignores_missing_ids() {
        let resolver = DependencyResolver::new();
        let graph = adjacency(&[("a", &["ghost"])]);
        assert!(resolver.detect_cycle(&graph).is_none());
    }

    #[test]
    fn test_validate_plan() {
        let resolver = DependencyResolver::new();
        let plan = Plan::new("g")
            .with_task(TaskDefinition::new("A", "t").with_id("a"))
            .with_task(TaskDefinition::new("B", "t").with_id("b").with_dependency("a"))
            .with_task(TaskDefinition::new("C", "t").with_id("c").with_dependency("ghost"))
            .with_task(TaskDefinition::new("A again", "t").with_id("a"));

        let report = resolver.validate_plan(&plan);
        assert!(!report.is_valid());
        assert_eq!(
            report.missing_dependencies,
            vec![("c".to_string(), "ghost".to_string())]
        );
        assert_eq!(report.duplicate_ids, vec!["a".to_string()]);
        assert!(report.cycle.is_none());
        assert_eq!(
            report.levels,
            vec![vec!["a".to_string()], vec!["b".to_string()]]
        );
    }

    #[test]
    fn test_validate_plan_reports_cycle() {
        let resolver = DependencyResolver::new();
        let plan = Plan::new("g")
            .with_task(TaskDefinition::new("A", "t").with_id("a").with_dependency("b"))
            .with_task(TaskDefinition::new("B", "t").with_id("b").with_dependency("a"));
        let report = resolver.validate_plan(&plan);
        assert!(report.cycle.is_some());
        assert!(report.levels.is_empty());
    }

    #[test]
    fn test_diagnose_blocked_reasons() {
        let resolver = DependencyResolver::new();
        let mut graph = TaskGraph::new("g", "s");
        graph.add_task(Task::with_id("ok", "ok", "t")).unwrap();
        graph
            .add_task(Task::with_id("bad", "bad", "t").with_max_retries(0))
            .unwrap();
        graph.add_task(Task::with_id("gone", "gone", "t")).unwrap();
        graph
            .add_task(Task::with_id("m", "m", "t").with_dependency("ghost"))
            .unwrap();
        graph
            .add_task(Task::with_id("f", "f", "t").with_dependency("ok").with_dependency("bad"))
            .unwrap();
        graph
            .add_task(Task::with_id("c", "c", "t").with_dependency("gone"))
            .unwrap();
        graph
            .add_task(Task::with_id("x", "x", "t").with_dependency("y"))
            .unwrap();
        graph
            .add_task(Task::with_id("y", "y", "t").with_dependency("x"))
            .unwrap();
        graph
            .add_task(Task::with_id("after", "after", "t").with_dependency("m"))
            .unwrap();

        graph.mark_started("ok").unwrap();
        graph.mark_completed("ok", TaskResult::new(serde_json::json!(1))).unwrap();
        graph.mark_started("bad").unwrap();
        graph.mark_failed("bad", "boom").unwrap();
        graph.mark_cancelled("gone").unwrap();

        let reasons: HashMap<String, BlockReason> = resolver
            .diagnose_blocked(&graph)
            .into_iter()
            .map(|b| (b.task_id, b.reason))
            .collect();

        assert_eq!(reasons["m"], BlockReason::MissingDependency("ghost".into()));
        assert_eq!(reasons["f"], BlockReason::FailedDependency("bad".into()));
        assert_eq!(reasons["c"], BlockReason::CancelledDependency("gone".into()));
        assert_eq!(
            reasons["x"],
            BlockReason::Cycle(vec!["x".into(), "y".into(), "x".into()])
        );
        assert_eq!(reasons["after"], BlockReason::BlockedBy("m".into()));
        assert_eq!(reasons.len(), 6);
    }
}
