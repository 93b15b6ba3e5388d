// src/dag/state_manager.rs

//! Forward propagation of per-run state through the graph.

use std::collections::HashSet;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, warn};

use crate::dag::task_info::{SkipReason, TaskNode, TaskState};
use crate::engine::TaskId;

/// Borrowing helper that owns the READY/SKIPPED propagation rules.
pub(crate) struct StateManager<'a> {
    graph: &'a mut DiGraph<TaskNode, ()>,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a mut DiGraph<TaskNode, ()>) -> Self {
        Self { graph }
    }

    /// True when every direct predecessor of `idx` has `Succeeded`.
    ///
    /// Vacuously true for roots.
    pub fn predecessors_succeeded(&self, idx: NodeIndex) -> bool {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .all(|p| self.graph[p].state == TaskState::Succeeded)
    }

    /// Move `idx` from `Pending` to `Ready` if nothing holds it back.
    ///
    /// Returns `true` if the task was promoted.
    pub fn promote_if_ready(&mut self, idx: NodeIndex) -> bool {
        let eligible = {
            let node = &self.graph[idx];
            node.state == TaskState::Pending && !node.held_for_retry
        };

        if eligible && self.predecessors_succeeded(idx) {
            let node = &mut self.graph[idx];
            node.state = TaskState::Ready;
            debug!(task = %node.spec.id(), "all predecessors succeeded; marked Ready");
            true
        } else {
            false
        }
    }

    /// Re-evaluate the direct dependents of a task that just succeeded.
    pub fn promote_ready_dependents(&mut self, idx: NodeIndex) -> Vec<TaskId> {
        let dependents: Vec<NodeIndex> = self.dependents_in_order(idx);

        let mut newly_ready = Vec::new();
        for dep in dependents {
            if self.promote_if_ready(dep) {
                newly_ready.push(self.graph[dep].spec.id().to_string());
            }
        }
        newly_ready
    }

    /// Mark every transitive dependent of `failed` as `Skipped`.
    ///
    /// Dependents that are already terminal are left alone. Returns the newly
    /// skipped tasks in discovery order.
    pub fn skip_dependents(&mut self, failed: NodeIndex) -> Vec<TaskId> {
        let root_id = self.graph[failed].spec.id().to_string();
        let mut stack: Vec<NodeIndex> = self.dependents_in_order(failed);
        stack.reverse();

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut newly_skipped = Vec::new();

        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }

            let node = &mut self.graph[idx];
            match node.state {
                TaskState::Pending | TaskState::Ready => {
                    node.state = TaskState::Skipped;
                    node.held_for_retry = false;
                    node.skip_reason = Some(SkipReason::UpstreamFailed(root_id.clone()));
                    debug!(
                        task = %node.spec.id(),
                        upstream = %root_id,
                        "upstream failed; marked Skipped"
                    );
                    newly_skipped.push(node.spec.id().to_string());
                }
                TaskState::Running => {
                    // Unreachable for a well-formed graph: a running task has
                    // only succeeded predecessors.
                    warn!(
                        task = %node.spec.id(),
                        upstream = %root_id,
                        "dependent of failed task is running; leaving it alone"
                    );
                    continue;
                }
                TaskState::Succeeded | TaskState::Failed | TaskState::Skipped => continue,
            }

            let mut next = self.dependents_in_order(idx);
            next.reverse();
            stack.extend(next);
        }

        newly_skipped
    }

    /// Direct dependents of `idx`, in task insertion order.
    fn dependents_in_order(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut dependents: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        dependents.sort();
        dependents.dedup();
        dependents
    }
}
