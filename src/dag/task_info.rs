// src/dag/task_info.rs

//! Per-run task state and the dispatch descriptor handed to workers.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::dag::TaskSpec;
use crate::engine::TaskId;
use crate::exec::{Executor, TaskContext};
use crate::types::FailureKind;

/// Lifecycle state of a task within one run.
///
/// `Succeeded`, `Failed` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Waiting on predecessors (or on a retry backoff).
    Pending,
    /// Every predecessor succeeded; waiting for a worker.
    Ready,
    /// Handed to a worker; the executor has not reported yet.
    Running,
    Succeeded,
    /// Failed and out of retries.
    Failed,
    /// Never executed, see [`SkipReason`].
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Skipped
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Pending => "PENDING",
            TaskState::Ready => "READY",
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
            TaskState::Skipped => "SKIPPED",
        };
        f.pad(s)
    }
}

/// Why a task ended up `Skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "task", rename_all = "snake_case")]
pub enum SkipReason {
    /// An upstream task (named here) failed or was itself skipped.
    UpstreamFailed(TaskId),
    /// The run was cancelled before the task was dispatched.
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UpstreamFailed(task) => write!(f, "upstream '{task}' did not succeed"),
            SkipReason::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// Last failure seen for a task, kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Static spec plus mutable per-run state (internal to the graph).
#[derive(Debug, Clone)]
pub(crate) struct TaskNode {
    pub spec: Arc<TaskSpec>,
    pub state: TaskState,
    /// Number of times the task has been dispatched in this run.
    pub attempts: u32,
    /// Pending because of a retry backoff rather than predecessors.
    pub held_for_retry: bool,
    pub skip_reason: Option<SkipReason>,
    pub last_failure: Option<LastFailure>,
}

impl TaskNode {
    pub fn new(spec: Arc<TaskSpec>) -> Self {
        Self {
            spec,
            state: TaskState::Pending,
            attempts: 0,
            held_for_retry: false,
            skip_reason: None,
            last_failure: None,
        }
    }
}

/// Read-only snapshot of one task's run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub task: TaskId,
    pub state: TaskState,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<LastFailure>,
}

impl From<&TaskNode> for TaskSummary {
    fn from(node: &TaskNode) -> Self {
        Self {
            task: node.spec.id().to_string(),
            state: node.state,
            attempts: node.attempts,
            skip_reason: node.skip_reason.clone(),
            last_failure: node.last_failure.clone(),
        }
    }
}

/// A task the scheduler wants a worker to execute now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: TaskId,
    /// 1-based attempt number of this dispatch.
    pub attempt: u32,
    pub executor: Arc<dyn Executor>,
    pub context: TaskContext,
}
