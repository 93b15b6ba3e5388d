// src/engine/mod.rs

//! Scheduling engine for loadgate.
//!
//! This module ties together:
//! - the per-run [`crate::dag::DependencyGraph`]
//! - the per-task [`retry::RetryPolicy`]
//! - the [`report::RunReport`] accumulated while the run progresses
//! - the runner event loop that reacts to:
//!   - task completion events from workers
//!   - retry backoff timers expiring
//!   - external cancellation
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use chrono::{DateTime, Utc};

/// Canonical task identifier type used throughout the engine.
pub type TaskId = String;

/// Default worker pool size.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Options shared by the core and the async shell.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Upper bound on concurrently running tasks.
    pub max_workers: usize,
    /// Pipeline name, used for the run id and logs.
    pub pipeline: String,
    /// Logical timestamp of the scheduled run.
    pub logical_ts: DateTime<Utc>,
}

impl RunnerOptions {
    pub fn new(pipeline: impl Into<String>, logical_ts: DateTime<Utc>) -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            pipeline: pipeline.into(),
            logical_ts,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }
}

/// Events flowing into the runner from workers, timers and signals.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// A worker finished one attempt.
    TaskFinished(TaskResult),
    /// The backoff for a retried task elapsed.
    RetryDue { task: TaskId },
    /// Stop dispatching; let running tasks finish.
    CancelRequested,
}

pub mod core;
pub mod event_handlers;
pub mod report;
pub mod retry;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use report::{Diagnostics, RunOutcome, RunReport, TaskOutcome, TaskResult};
pub use retry::{RetryDecision, RetryPolicy};
pub use runtime::Runner;
