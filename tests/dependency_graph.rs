// tests/dependency_graph.rs

mod common;
use crate::common::TestResult;
use crate::common::builders::{graph_of, spec};

use loadgate::dag::{DependencyGraph, GraphError, SkipReason, TaskSpec, TaskState};
use loadgate::engine::{RetryPolicy, TaskResult};
use loadgate::exec::{Executor, NoopExecutor};
use loadgate::types::FailureKind;
use std::sync::Arc;

fn noop() -> Arc<dyn Executor> {
    Arc::new(NoopExecutor)
}

fn ok(task: &str, attempt: u32) -> TaskResult {
    TaskResult::success(task, attempt, Default::default())
}

fn failed(task: &str, attempt: u32) -> TaskResult {
    TaskResult::failure(task, attempt, FailureKind::Warehouse, "boom")
}

/// Dispatch and succeed `task`.
fn complete(graph: &mut DependencyGraph, task: &str) -> TestResult {
    let attempt = graph.mark_running(task)?;
    graph.mark_result(task, &ok(task, attempt))?;
    Ok(())
}

fn diamond() -> DependencyGraph {
    // a -> {b, c} -> d
    graph_of(
        &[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])],
        noop(),
    )
}

#[test]
fn roots_are_ready_and_dependents_pending() {
    let graph = diamond();

    assert_eq!(graph.ready_tasks(), vec!["a".to_string()]);
    assert_eq!(graph.state_of("b"), Some(TaskState::Pending));
    assert_eq!(graph.state_of("d"), Some(TaskState::Pending));
    assert!(!graph.is_complete());
}

#[test]
fn ready_tasks_is_a_pure_query() {
    let graph = diamond();
    assert_eq!(graph.ready_tasks(), graph.ready_tasks());
    assert_eq!(graph.state_of("a"), Some(TaskState::Ready));
}

#[test]
fn fan_out_promotes_all_siblings_at_once() -> TestResult {
    let mut graph = diamond();

    let attempt = graph.mark_running("a")?;
    assert_eq!(attempt, 1);
    let step = graph.mark_result("a", &ok("a", attempt))?;

    assert_eq!(step.newly_ready, vec!["b".to_string(), "c".to_string()]);
    assert!(step.newly_skipped.is_empty());
    Ok(())
}

#[test]
fn fan_in_waits_for_every_predecessor() -> TestResult {
    let mut graph = diamond();
    complete(&mut graph, "a")?;
    complete(&mut graph, "b")?;

    assert_eq!(graph.state_of("d"), Some(TaskState::Pending));
    assert!(!graph.ready_tasks().contains(&"d".to_string()));

    complete(&mut graph, "c")?;
    assert_eq!(graph.ready_tasks(), vec!["d".to_string()]);

    complete(&mut graph, "d")?;
    assert!(graph.is_complete());
    Ok(())
}

#[test]
fn failure_skips_every_transitive_dependent() -> TestResult {
    // a -> b -> c -> d, plus an independent e
    let mut graph = graph_of(
        &[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &["c"]), ("e", &[])],
        noop(),
    );
    complete(&mut graph, "a")?;

    graph.mark_running("b")?;
    let step = graph.mark_result("b", &failed("b", 1))?;

    assert_eq!(step.newly_skipped, vec!["c".to_string(), "d".to_string()]);
    assert_eq!(graph.state_of("b"), Some(TaskState::Failed));
    for task in ["c", "d"] {
        let summary = graph.summary(task).expect("known task");
        assert_eq!(summary.state, TaskState::Skipped);
        assert_eq!(summary.attempts, 0);
        assert_eq!(
            summary.skip_reason,
            Some(SkipReason::UpstreamFailed("b".to_string()))
        );
    }

    // Independent branches keep going.
    assert_eq!(graph.ready_tasks(), vec!["e".to_string()]);
    complete(&mut graph, "e")?;
    assert!(graph.is_complete());
    Ok(())
}

#[test]
fn failed_task_records_last_failure() -> TestResult {
    let mut graph = diamond();
    graph.mark_running("a")?;
    graph.mark_result("a", &failed("a", 1))?;

    let summary = graph.summary("a").expect("known task");
    let failure = summary.last_failure.expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::Warehouse);
    assert_eq!(failure.message, "boom");
    assert!(graph.is_complete());
    Ok(())
}

#[test]
fn self_dependency_is_a_cycle() {
    let mut graph = DependencyGraph::new();
    let err = graph
        .add_task(spec("a", noop(), &["a"], RetryPolicy::none()))
        .unwrap_err();

    assert!(matches!(err, GraphError::Cycle { .. }));
    assert!(err.is_configuration());
    assert!(graph.is_empty());
}

#[test]
fn unknown_predecessor_is_rejected() {
    let mut graph = DependencyGraph::new();
    let err = graph
        .add_task(spec("b", noop(), &["a"], RetryPolicy::none()))
        .unwrap_err();

    assert_eq!(
        err,
        GraphError::UnknownPredecessor {
            task: "b".to_string(),
            predecessor: "a".to_string()
        }
    );
    assert!(graph.is_empty());
}

#[test]
fn duplicate_ids_are_rejected() {
    let mut graph = graph_of(&[("a", &[])], noop());
    let err = graph
        .add_task(spec("a", noop(), &[], RetryPolicy::none()))
        .unwrap_err();
    assert_eq!(err, GraphError::DuplicateTask("a".to_string()));
    assert_eq!(graph.len(), 1);
}

#[test]
fn add_dependency_closing_a_cycle_is_rejected() -> TestResult {
    // A depends on B, then B on A.
    let mut graph = graph_of(&[("b", &[]), ("a", &["b"])], noop());

    let err = graph.add_dependency("a", "b").unwrap_err();
    assert!(matches!(err, GraphError::Cycle { .. }));

    // Nothing became schedulable through the rejected edge.
    assert_eq!(graph.ready_tasks(), vec!["b".to_string()]);
    assert_eq!(graph.predecessors_of("b"), Vec::<String>::new());
    Ok(())
}

#[test]
fn add_dependency_demotes_a_ready_root() -> TestResult {
    let mut graph = graph_of(&[("a", &[]), ("b", &[])], noop());
    assert_eq!(graph.ready_tasks().len(), 2);

    graph.add_dependency("a", "b")?;
    assert_eq!(graph.ready_tasks(), vec!["a".to_string()]);
    assert_eq!(graph.state_of("b"), Some(TaskState::Pending));

    // Adding the same edge twice is harmless.
    graph.add_dependency("a", "b")?;
    assert_eq!(graph.dependents_of("a"), vec!["b".to_string()]);
    Ok(())
}

#[test]
fn add_dependency_with_unknown_ids() {
    let mut graph = graph_of(&[("a", &[])], noop());

    assert_eq!(
        graph.add_dependency("a", "zzz").unwrap_err(),
        GraphError::UnknownTask("zzz".to_string())
    );
    assert!(matches!(
        graph.add_dependency("zzz", "a").unwrap_err(),
        GraphError::UnknownPredecessor { .. }
    ));
}

#[test]
fn structure_is_frozen_once_started() -> TestResult {
    let mut graph = graph_of(&[("a", &[]), ("b", &[])], noop());
    graph.mark_running("a")?;

    assert_eq!(
        graph
            .add_task(spec("c", noop(), &[], RetryPolicy::none()))
            .unwrap_err(),
        GraphError::Frozen
    );
    assert_eq!(graph.add_dependency("a", "b").unwrap_err(), GraphError::Frozen);
    Ok(())
}

#[test]
fn invalid_transitions_are_errors_not_panics() -> TestResult {
    let mut graph = diamond();

    // b is Pending, not Ready.
    assert!(matches!(
        graph.mark_running("b").unwrap_err(),
        GraphError::InvalidTransition {
            from: TaskState::Pending,
            to: TaskState::Running,
            ..
        }
    ));

    // a is Ready, not Running.
    let err = graph.mark_result("a", &ok("a", 1)).unwrap_err();
    assert!(!err.is_configuration());

    complete(&mut graph, "a")?;
    // Terminal states never move again.
    assert!(graph.mark_running("a").is_err());
    assert!(graph.mark_result("a", &failed("a", 1)).is_err());
    assert_eq!(graph.state_of("a"), Some(TaskState::Succeeded));
    Ok(())
}

#[test]
fn retry_hold_keeps_attempts_and_blocks_readiness() -> TestResult {
    let mut graph = diamond();

    assert_eq!(graph.mark_running("a")?, 1);
    graph.mark_retry("a", &failed("a", 1))?;

    assert_eq!(graph.state_of("a"), Some(TaskState::Pending));
    assert!(graph.ready_tasks().is_empty());
    assert_eq!(graph.attempts_of("a"), Some(1));

    assert!(graph.release_retry("a")?);
    assert_eq!(graph.ready_tasks(), vec!["a".to_string()]);
    assert_eq!(graph.mark_running("a")?, 2);

    // Releasing a task that is not held is a no-op.
    assert!(!graph.release_retry("a")?);
    Ok(())
}

#[test]
fn cancel_remaining_skips_undispatched_tasks_only() -> TestResult {
    let mut graph = graph_of(&[("a", &[]), ("b", &[]), ("c", &["a"])], noop());
    graph.mark_running("a")?;

    let skipped = graph.cancel_remaining();
    assert_eq!(skipped, vec!["b".to_string(), "c".to_string()]);
    assert_eq!(graph.state_of("a"), Some(TaskState::Running));
    assert_eq!(
        graph.summary("b").and_then(|s| s.skip_reason),
        Some(SkipReason::Cancelled)
    );
    assert!(!graph.is_complete());

    graph.mark_result("a", &ok("a", 1))?;
    assert!(graph.is_complete());
    // c stays skipped even though its predecessor succeeded.
    assert_eq!(graph.state_of("c"), Some(TaskState::Skipped));
    Ok(())
}

#[test]
fn topological_order_respects_added_edges() -> TestResult {
    let mut graph = graph_of(&[("late", &[]), ("early", &[])], noop());
    graph.add_dependency("early", "late")?;

    assert_eq!(
        graph.topological_order(),
        vec!["early".to_string(), "late".to_string()]
    );
    Ok(())
}

#[test]
fn spec_builder_validates_required_fields() {
    use loadgate::exec::LoadExecutor;
    use loadgate_test_utils::MemoryWarehouse;

    let load: Arc<dyn Executor> = Arc::new(LoadExecutor::new(
        "SELECT 1",
        MemoryWarehouse::new().connector(),
    ));

    let err = TaskSpec::builder("load_users", load.clone()).build().unwrap_err();
    assert!(matches!(err, GraphError::InvalidSpec { .. }));

    let err = TaskSpec::builder("  ", noop()).build().unwrap_err();
    assert!(matches!(err, GraphError::InvalidSpec { .. }));

    let spec = TaskSpec::builder("load_users", load)
        .target_table("users")
        .after("a")
        .after("a")
        .build()
        .expect("valid spec");
    assert_eq!(spec.predecessors(), ["a".to_string()]);
    assert_eq!(spec.target_table(), Some("users"));
    assert_eq!(spec.retry(), &RetryPolicy::default());
}
