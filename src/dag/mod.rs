// src/dag/mod.rs

//! Task graph representation and per-run state.
//!
//! - [`task_spec`] holds the immutable [`TaskSpec`] and its builder.
//! - [`graph`] holds [`DependencyGraph`]: the DAG plus the state of one run.
//! - [`task_info`] provides task states and the scheduled-task descriptor.
//! - [`state_manager`] owns READY promotion and SKIPPED propagation.
//! - [`graph_step`] defines the result type for a single transition.

pub mod error;
pub mod graph;
pub mod graph_step;
pub(crate) mod state_manager;
pub mod task_info;
pub mod task_spec;

pub use error::GraphError;
pub use graph::DependencyGraph;
pub use graph_step::GraphStep;
pub use task_info::{LastFailure, ScheduledTask, SkipReason, TaskState, TaskSummary};
pub use task_spec::{TaskSpec, TaskSpecBuilder};
