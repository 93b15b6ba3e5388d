// src/dag/error.rs

use thiserror::Error;

use crate::dag::TaskState;
use crate::engine::TaskId;

/// Errors raised while building or driving a [`crate::dag::DependencyGraph`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate task id '{0}'")]
    DuplicateTask(TaskId),

    #[error("task '{task}' references unknown predecessor '{predecessor}'")]
    UnknownPredecessor { task: TaskId, predecessor: TaskId },

    #[error("cycle detected in task graph involving task '{task}': {detail}")]
    Cycle { task: TaskId, detail: String },

    #[error("invalid task spec '{task}': {reason}")]
    InvalidSpec { task: TaskId, reason: String },

    #[error("unknown task '{0}'")]
    UnknownTask(TaskId),

    #[error("task '{task}' cannot move from {from} to {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskState,
        to: TaskState,
    },

    #[error("graph cannot be modified once the run has started")]
    Frozen,
}

impl GraphError {
    /// Whether this error describes a malformed graph (as opposed to a
    /// scheduler bug driving a well-formed one).
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            GraphError::InvalidTransition { .. } | GraphError::Frozen
        )
    }
}
