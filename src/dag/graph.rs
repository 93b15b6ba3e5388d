// src/dag/graph.rs

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info, warn};

use crate::dag::GraphError;
use crate::dag::graph_step::GraphStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{LastFailure, SkipReason, TaskNode, TaskState, TaskSummary};
use crate::dag::task_spec::TaskSpec;
use crate::engine::TaskId;
use crate::engine::report::{TaskOutcome, TaskResult};

/// Task DAG plus the per-task state of exactly one run.
///
/// Edges point from predecessor to dependent. Node indices follow insertion
/// order, which is also the order queries report tasks in; callers must not
/// read anything into the relative order of siblings.
///
/// A fresh (never started) graph can be cloned to obtain an independent run:
/// that is how [`crate::pipeline::PipelineDefinition`] hands out graphs.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<TaskNode, ()>,
    index: HashMap<TaskId, NodeIndex>,
    /// Set on the first dispatch; structure is frozen from then on.
    started: bool,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task whose predecessors are already in the graph.
    ///
    /// Fails with [`GraphError::Cycle`] if the spec lists itself as a
    /// predecessor, [`GraphError::UnknownPredecessor`] if a predecessor is
    /// not known yet, and [`GraphError::DuplicateTask`] on an id clash. On
    /// error the graph is left untouched.
    pub fn add_task(&mut self, spec: TaskSpec) -> Result<(), GraphError> {
        if self.started {
            return Err(GraphError::Frozen);
        }

        let id = spec.id().to_string();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateTask(id));
        }

        let mut pred_indices = Vec::with_capacity(spec.predecessors().len());
        for pred in spec.predecessors() {
            if *pred == id {
                return Err(GraphError::Cycle {
                    task: id.clone(),
                    detail: format!("'{id}' lists itself as a predecessor"),
                });
            }
            match self.index.get(pred) {
                Some(idx) => pred_indices.push(*idx),
                None => {
                    return Err(GraphError::UnknownPredecessor {
                        task: id,
                        predecessor: pred.clone(),
                    });
                }
            }
        }

        let idx = self.graph.add_node(TaskNode::new(Arc::new(spec)));
        for pred_idx in pred_indices {
            self.graph.add_edge(pred_idx, idx, ());
        }
        self.index.insert(id.clone(), idx);

        StateManager::new(&mut self.graph).promote_if_ready(idx);
        debug!(task = %id, "task added to graph");
        Ok(())
    }

    /// Add an explicit `upstream -> downstream` edge between known tasks.
    ///
    /// Rejects self-edges and edges that would close a cycle. Adding an
    /// existing edge is a no-op.
    pub fn add_dependency(&mut self, upstream: &str, downstream: &str) -> Result<(), GraphError> {
        if self.started {
            return Err(GraphError::Frozen);
        }

        let down_idx = self.node_index(downstream)?;
        let up_idx = match self.index.get(upstream) {
            Some(idx) => *idx,
            None => {
                return Err(GraphError::UnknownPredecessor {
                    task: downstream.to_string(),
                    predecessor: upstream.to_string(),
                });
            }
        };

        if up_idx == down_idx || has_path_connecting(&self.graph, down_idx, up_idx, None) {
            return Err(GraphError::Cycle {
                task: downstream.to_string(),
                detail: format!("'{upstream}' already depends on '{downstream}'"),
            });
        }

        if self.graph.find_edge(up_idx, down_idx).is_some() {
            return Ok(());
        }

        self.graph.add_edge(up_idx, down_idx, ());

        // A root may have been Ready; it now waits on its new predecessor.
        let node = &mut self.graph[down_idx];
        if node.state == TaskState::Ready {
            node.state = TaskState::Pending;
        }
        StateManager::new(&mut self.graph).promote_if_ready(down_idx);
        Ok(())
    }

    /// Tasks currently `Ready`, in insertion order. Pure query.
    pub fn ready_tasks(&self) -> Vec<TaskId> {
        self.graph
            .node_indices()
            .filter(|idx| self.graph[*idx].state == TaskState::Ready)
            .map(|idx| self.graph[idx].spec.id().to_string())
            .collect()
    }

    /// `Ready -> Running`. Returns the 1-based attempt number of this dispatch.
    pub fn mark_running(&mut self, task: &str) -> Result<u32, GraphError> {
        let idx = self.node_index(task)?;
        self.expect_state(idx, TaskState::Ready, TaskState::Running)?;

        self.started = true;
        let node = &mut self.graph[idx];
        node.state = TaskState::Running;
        node.attempts += 1;
        debug!(task = %task, attempt = node.attempts, "marked Running");
        Ok(node.attempts)
    }

    /// Record the terminal result of a `Running` task.
    ///
    /// Success moves the task to `Succeeded` and promotes dependents whose
    /// predecessors have now all succeeded. Failure moves it to `Failed` and
    /// skips every transitive dependent. Retry decisions are made by the
    /// caller beforehand; see [`mark_retry`](Self::mark_retry).
    pub fn mark_result(&mut self, task: &str, result: &TaskResult) -> Result<GraphStep, GraphError> {
        let idx = self.node_index(task)?;
        let target = match result.outcome {
            TaskOutcome::Success => TaskState::Succeeded,
            TaskOutcome::Failed { .. } => TaskState::Failed,
        };
        self.expect_state(idx, TaskState::Running, target)?;

        let node = &mut self.graph[idx];
        node.state = target;

        let mut step = GraphStep::default();
        match &result.outcome {
            TaskOutcome::Success => {
                info!(task = %task, attempt = node.attempts, "task succeeded");
                step.newly_ready = StateManager::new(&mut self.graph).promote_ready_dependents(idx);
            }
            TaskOutcome::Failed { kind, message } => {
                node.last_failure = Some(LastFailure {
                    kind: *kind,
                    message: message.clone(),
                });
                warn!(
                    task = %task,
                    attempt = node.attempts,
                    kind = %kind,
                    error = %message,
                    "task failed; skipping dependents"
                );
                step.newly_skipped = StateManager::new(&mut self.graph).skip_dependents(idx);
            }
        }

        Ok(step)
    }

    /// `Running -> Pending`, held until [`release_retry`](Self::release_retry).
    ///
    /// The attempt count is kept, and the failure is remembered for the report.
    pub fn mark_retry(&mut self, task: &str, result: &TaskResult) -> Result<(), GraphError> {
        let idx = self.node_index(task)?;
        self.expect_state(idx, TaskState::Running, TaskState::Pending)?;

        let node = &mut self.graph[idx];
        node.state = TaskState::Pending;
        node.held_for_retry = true;
        if let TaskOutcome::Failed { kind, message } = &result.outcome {
            node.last_failure = Some(LastFailure {
                kind: *kind,
                message: message.clone(),
            });
        }
        debug!(task = %task, attempt = node.attempts, "held for retry");
        Ok(())
    }

    /// Release a task held for retry so it becomes `Ready` again.
    ///
    /// Returns `false` if the task is no longer waiting (e.g. the run was
    /// cancelled in the meantime).
    pub fn release_retry(&mut self, task: &str) -> Result<bool, GraphError> {
        let idx = self.node_index(task)?;
        let node = &mut self.graph[idx];
        if node.state != TaskState::Pending || !node.held_for_retry {
            return Ok(false);
        }
        node.held_for_retry = false;
        Ok(StateManager::new(&mut self.graph).promote_if_ready(idx))
    }

    /// Skip everything that has not been dispatched yet.
    ///
    /// `Running` tasks are left to finish. Returns the newly skipped tasks.
    pub fn cancel_remaining(&mut self) -> Vec<TaskId> {
        let mut skipped = Vec::new();
        for node in self.graph.node_weights_mut() {
            if matches!(node.state, TaskState::Pending | TaskState::Ready) {
                node.state = TaskState::Skipped;
                node.held_for_retry = false;
                node.skip_reason = Some(SkipReason::Cancelled);
                skipped.push(node.spec.id().to_string());
            }
        }
        if !skipped.is_empty() {
            info!(?skipped, "run cancelled; undispatched tasks skipped");
        }
        skipped
    }

    /// True when no task is `Pending`, `Ready` or `Running`.
    pub fn is_complete(&self) -> bool {
        self.graph.node_weights().all(|node| node.state.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, task: &str) -> bool {
        self.index.contains_key(task)
    }

    /// All task ids in insertion order.
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.graph
            .node_weights()
            .map(|node| node.spec.id().to_string())
            .collect()
    }

    pub fn spec(&self, task: &str) -> Option<&Arc<TaskSpec>> {
        let idx = self.index.get(task)?;
        Some(&self.graph[*idx].spec)
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        let idx = self.index.get(task)?;
        Some(self.graph[*idx].state)
    }

    pub fn attempts_of(&self, task: &str) -> Option<u32> {
        let idx = self.index.get(task)?;
        Some(self.graph[*idx].attempts)
    }

    /// Direct predecessors, in insertion order.
    pub fn predecessors_of(&self, task: &str) -> Vec<TaskId> {
        self.neighbors(task, Direction::Incoming)
    }

    /// Direct dependents, in insertion order.
    pub fn dependents_of(&self, task: &str) -> Vec<TaskId> {
        self.neighbors(task, Direction::Outgoing)
    }

    /// Task ids ordered so that every predecessor precedes its dependents.
    pub fn topological_order(&self) -> Vec<TaskId> {
        // Insertion order already satisfies this unless `add_dependency`
        // introduced a backward edge.
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(order) => order
                .into_iter()
                .map(|idx| self.graph[idx].spec.id().to_string())
                .collect(),
            Err(_) => self.task_ids(),
        }
    }

    pub fn summary(&self, task: &str) -> Option<TaskSummary> {
        let idx = self.index.get(task)?;
        Some(TaskSummary::from(&self.graph[*idx]))
    }

    /// Snapshot of every task, in insertion order.
    pub fn summaries(&self) -> Vec<TaskSummary> {
        self.graph.node_weights().map(TaskSummary::from).collect()
    }

    fn neighbors(&self, task: &str, dir: Direction) -> Vec<TaskId> {
        let Some(idx) = self.index.get(task) else {
            return Vec::new();
        };
        let mut indices: Vec<NodeIndex> = self.graph.neighbors_directed(*idx, dir).collect();
        indices.sort();
        indices.dedup();
        indices
            .into_iter()
            .map(|i| self.graph[i].spec.id().to_string())
            .collect()
    }

    fn node_index(&self, task: &str) -> Result<NodeIndex, GraphError> {
        self.index
            .get(task)
            .copied()
            .ok_or_else(|| GraphError::UnknownTask(task.to_string()))
    }

    fn expect_state(&self, idx: NodeIndex, from: TaskState, to: TaskState) -> Result<(), GraphError> {
        let node = &self.graph[idx];
        if node.state == from {
            Ok(())
        } else {
            Err(GraphError::InvalidTransition {
                task: node.spec.id().to_string(),
                from: node.state,
                to,
            })
        }
    }
}
