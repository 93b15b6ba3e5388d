// tests/property/graph.rs
//
// Drives the pure core over random DAGs with a random set of failing tasks
// and checks the end state against the graph's reachability.

#[path = "../common/mod.rs"]
mod common;

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use loadgate::dag::{DependencyGraph, TaskState};
use loadgate::engine::{CoreRuntime, RetryPolicy, RunOutcome, RunnerEvent, RunnerOptions, TaskResult};
use loadgate::exec::{Executor, NoopExecutor};
use loadgate::types::FailureKind;

use crate::common::builders::spec;
use crate::common::logical_ts;

/// Predecessor lists where task `i` only depends on tasks `0..i`.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        deps.into_iter().map(|d| d % i).collect()
                    }
                })
                .collect()
        })
    })
}

fn name(i: usize) -> String {
    format!("task_{i}")
}

fn build(deps: &[BTreeSet<usize>], retries: u32) -> DependencyGraph {
    let noop: Arc<dyn Executor> = Arc::new(NoopExecutor);
    let retry = RetryPolicy::new(retries, Duration::from_secs(300));
    let mut graph = DependencyGraph::new();
    for (i, preds) in deps.iter().enumerate() {
        let names: Vec<String> = preds.iter().map(|p| name(*p)).collect();
        let after: Vec<&str> = names.iter().map(String::as_str).collect();
        graph
            .add_task(spec(&name(i), noop.clone(), &after, retry))
            .expect("generated graph is valid");
    }
    graph
}

/// Tasks with a failing task among their ancestors. These are never
/// dispatched, even when they would fail themselves.
fn blocked_upstream(deps: &[BTreeSet<usize>], failing: &HashSet<usize>) -> HashSet<usize> {
    let mut blocked = HashSet::new();
    // Predecessors always have lower indices.
    for (i, preds) in deps.iter().enumerate() {
        if preds
            .iter()
            .any(|p| failing.contains(p) || blocked.contains(p))
        {
            blocked.insert(i);
        }
    }
    blocked
}

proptest! {
    #[test]
    fn run_terminates_with_consistent_states(
        deps in dag_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..4),
        max_workers in 1..5usize,
        retries in 0..3u32,
    ) {
        let failing: HashSet<usize> = failing.into_iter().filter(|i| *i < deps.len()).collect();
        let options = RunnerOptions::new("prop", logical_ts()).with_max_workers(max_workers);
        let mut core = CoreRuntime::new(build(&deps, retries), options);

        // Tasks in flight and retries waiting on a timer.
        let mut running: Vec<(String, u32)> = Vec::new();
        let mut waiting: Vec<String> = Vec::new();
        let mut max_in_flight = 0;

        let mut step = core.start();
        let mut steps = 0;
        loop {
            for task in step.dispatched() {
                running.push((task.task.clone(), task.attempt));
            }
            for command in &step.commands {
                if let loadgate::engine::CoreCommand::ScheduleRetry { task, .. } = command {
                    waiting.push(task.clone());
                }
            }
            max_in_flight = max_in_flight.max(core.in_flight());
            if !step.keep_running {
                break;
            }

            steps += 1;
            prop_assert!(steps < 1_000, "run did not terminate");

            let event = if let Some((task, attempt)) = running.pop() {
                let idx: usize = task.trim_start_matches("task_").parse().unwrap();
                if failing.contains(&idx) {
                    RunnerEvent::TaskFinished(TaskResult::failure(
                        task,
                        attempt,
                        FailureKind::Warehouse,
                        "scripted",
                    ))
                } else {
                    RunnerEvent::TaskFinished(TaskResult::success(task, attempt, Default::default()))
                }
            } else if let Some(task) = waiting.pop() {
                RunnerEvent::RetryDue { task }
            } else {
                return Err(TestCaseError::fail("core waits with nothing in flight"));
            };
            step = core.step(event);
        }

        prop_assert!(max_in_flight <= max_workers);

        let report = core.into_report();
        let blocked = blocked_upstream(&deps, &failing);
        for i in 0..deps.len() {
            let summary = report.task(&name(i)).expect("every task in report");
            let expected = if blocked.contains(&i) {
                TaskState::Skipped
            } else if failing.contains(&i) {
                TaskState::Failed
            } else {
                TaskState::Succeeded
            };
            prop_assert_eq!(summary.state, expected, "state of {}", name(i));

            let attempts = report.attempts_for(&name(i)).count() as u32;
            match expected {
                TaskState::Failed => prop_assert_eq!(attempts, retries + 1),
                TaskState::Succeeded => prop_assert_eq!(attempts, 1),
                _ => prop_assert_eq!(attempts, 0),
            }
        }

        let expected_outcome = if failing.is_empty() {
            RunOutcome::OverallSuccess
        } else {
            RunOutcome::OverallFailure
        };
        prop_assert_eq!(report.outcome, Some(expected_outcome));
    }

    #[test]
    fn topological_order_respects_every_edge(deps in dag_strategy(15)) {
        let graph = build(&deps, 0);
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), deps.len());

        let position = |task: &str| order.iter().position(|t| t == task).unwrap();
        for (i, preds) in deps.iter().enumerate() {
            for p in preds {
                prop_assert!(position(&name(*p)) < position(&name(i)));
            }
        }
    }

    #[test]
    fn closing_any_back_edge_is_rejected(deps in dag_strategy(10)) {
        let mut graph = build(&deps, 0);
        // Any edge from a task to one of its ancestors closes a cycle.
        for (i, preds) in deps.iter().enumerate() {
            if let Some(p) = preds.iter().next() {
                let err = graph.add_dependency(&name(i), &name(*p));
                let is_cycle = matches!(err, Err(loadgate::dag::GraphError::Cycle { .. }));
                prop_assert!(is_cycle, "edge {} -> {} accepted", name(i), name(*p));
            }
        }
    }
}
