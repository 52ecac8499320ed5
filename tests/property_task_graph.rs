use agent_taskgraph::{Task, TaskGraph, TaskResult, TaskStatus};
use proptest::prelude::*;
use std::collections::HashMap;

/// Random DAG: task `i` may only depend on tasks `0..i`.
fn dag_strategy() -> impl Strategy<Value = Vec<(i32, Vec<usize>)>> {
    (1usize..16).prop_flat_map(|size| {
        (0..size)
            .map(|i| {
                let deps = if i == 0 {
                    Just(Vec::<usize>::new()).boxed()
                } else {
                    proptest::collection::vec(0..i, 0..3).boxed()
                };
                (-3i32..4, deps)
            })
            .collect::<Vec<_>>()
    })
}

fn build(layout: &[(i32, Vec<usize>)]) -> TaskGraph {
    let mut graph = TaskGraph::new("property goal", "session");
    for (i, (priority, deps)) in layout.iter().enumerate() {
        let task = deps.iter().fold(
            Task::with_id(format!("t{i}"), format!("Task {i}"), "mock").with_priority(*priority),
            |t, d| t.with_dependency(format!("t{d}")),
        );
        graph.add_task(task).unwrap();
    }
    graph
}

proptest! {
    /// Property: completing ready tasks one at a time always finishes an
    /// acyclic graph, and every task starts after its dependencies completed.
    #[test]
    fn prop_ready_dispatch_completes_any_dag(layout in dag_strategy()) {
        let mut graph = build(&layout);
        let mut finished_at: HashMap<String, usize> = HashMap::new();
        let mut step = 0;

        while !graph.is_terminal_state() {
            let ready = graph.get_ready_tasks();
            prop_assert!(!ready.is_empty(), "acyclic graph must never stall");
            let task = &ready[0];
            for dep in &task.depends_on {
                prop_assert!(finished_at.contains_key(dep), "{} started before {}", task.id, dep);
            }
            graph.mark_started(&task.id).unwrap();
            graph.mark_completed(&task.id, TaskResult::new(serde_json::json!(step))).unwrap();
            finished_at.insert(task.id.clone(), step);
            step += 1;
        }

        prop_assert!(graph.has_all_completed());
        prop_assert_eq!(graph.execution_order().len(), layout.len());
    }

    /// Property: ready tasks come out by priority descending, insertion order
    /// among equal priorities.
    #[test]
    fn prop_ready_tasks_are_priority_ordered(priorities in proptest::collection::vec(-5i32..5, 1..20)) {
        let layout: Vec<(i32, Vec<usize>)> = priorities.iter().map(|p| (*p, Vec::new())).collect();
        let graph = build(&layout);
        let ready = graph.get_ready_tasks();

        prop_assert_eq!(ready.len(), priorities.len());
        for pair in ready.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.priority >= b.priority);
            if a.priority == b.priority {
                let index = |t: &Task| t.id[1..].parse::<usize>().unwrap();
                prop_assert!(index(a) < index(b));
            }
        }
    }

    /// Property: retry_count never decreases and the retry budget is honored.
    #[test]
    fn prop_retry_budget_is_respected(max_retries in 0u32..6, failures in 1usize..10) {
        let mut graph = TaskGraph::new("goal", "s");
        graph.add_task(Task::with_id("t", "T", "mock").with_max_retries(max_retries)).unwrap();

        let mut last_count = 0;
        for _ in 0..failures {
            graph.mark_started("t").unwrap();
            let failed = graph.mark_failed("t", "boom").unwrap();
            prop_assert!(failed.retry_count >= last_count);
            last_count = failed.retry_count;

            if failed.can_retry() {
                let retried = graph.mark_retry("t").unwrap();
                prop_assert_eq!(retried.retry_count, last_count + 1);
                prop_assert_eq!(retried.status, TaskStatus::Retrying);
                prop_assert!(retried.error.is_none());
                last_count = retried.retry_count;
            } else {
                prop_assert!(graph.mark_retry("t").is_err());
                prop_assert!(graph.has_terminal_failures());
                prop_assert_eq!(failed.retry_count, max_retries);
                break;
            }
        }
        prop_assert!(last_count <= max_retries);
    }
}
