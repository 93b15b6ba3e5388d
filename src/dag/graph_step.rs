// src/dag/graph_step.rs

//! Result type for a single graph state transition.

use crate::engine::TaskId;

/// What changed as a consequence of one `mark_*` call.
///
/// Useful for tests that step the graph by hand and assert on the wavefront.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStep {
    /// Tasks that moved to `Ready` in this step.
    pub newly_ready: Vec<TaskId>,
    /// Tasks that moved to `Skipped` in this step.
    pub newly_skipped: Vec<TaskId>,
}
