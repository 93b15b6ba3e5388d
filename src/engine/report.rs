// src/engine/report.rs

//! Task results and the aggregate run report.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dag::{DependencyGraph, TaskState, TaskSummary};
use crate::engine::TaskId;
use crate::types::FailureKind;

/// Outcome of one task attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failed { kind: FailureKind, message: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

/// Free-form diagnostics reported by an executor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Row counts observed per table (after a load, or by a quality check).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub row_counts: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Diagnostics {
    pub fn with_row_count(mut self, table: impl Into<String>, count: u64) -> Self {
        self.row_counts.insert(table.into(), count);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

/// Result of one task attempt, as appended to the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    pub task: TaskId,
    pub attempt: u32,
    pub outcome: TaskOutcome,
    pub diagnostics: Diagnostics,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TaskResult {
    pub fn success(task: impl Into<TaskId>, attempt: u32, diagnostics: Diagnostics) -> Self {
        Self {
            task: task.into(),
            attempt,
            outcome: TaskOutcome::Success,
            diagnostics,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn failure(
        task: impl Into<TaskId>,
        attempt: u32,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task: task.into(),
            attempt,
            outcome: TaskOutcome::Failed {
                kind,
                message: message.into(),
            },
            diagnostics: Diagnostics::default(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Final classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    OverallSuccess,
    OverallFailure,
    Cancelled,
}

impl RunOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::OverallSuccess => crate::EXIT_SUCCESS,
            RunOutcome::OverallFailure => crate::EXIT_FAILURE,
            RunOutcome::Cancelled => crate::EXIT_CANCELLED,
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::OverallSuccess => f.write_str("OVERALL_SUCCESS"),
            RunOutcome::OverallFailure => f.write_str("OVERALL_FAILURE"),
            RunOutcome::Cancelled => f.write_str("CANCELLED"),
        }
    }
}

/// Aggregate record of one pipeline run.
///
/// Created at run start, accumulates every attempt's [`TaskResult`] in an
/// append-only log, and is finalized once the graph has no
/// pending/ready/running task left.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub pipeline: String,
    pub logical_ts: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<RunOutcome>,
    /// Final state of every task, in graph insertion order.
    pub tasks: Vec<TaskSummary>,
    log: Vec<TaskResult>,
}

impl RunReport {
    pub fn start(pipeline: impl Into<String>, logical_ts: DateTime<Utc>) -> Self {
        let pipeline = pipeline.into();
        Self {
            run_id: run_id_for(&pipeline, logical_ts),
            pipeline,
            logical_ts,
            started_at: Utc::now(),
            finished_at: None,
            outcome: None,
            tasks: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Append an attempt's result to the run log.
    pub fn record(&mut self, result: TaskResult) {
        self.log.push(result);
    }

    /// The run log, oldest first.
    pub fn log(&self) -> &[TaskResult] {
        &self.log
    }

    /// Attempts recorded for a task, oldest first.
    pub fn attempts_for<'a>(&'a self, task: &'a str) -> impl Iterator<Item = &'a TaskResult> + 'a {
        self.log.iter().filter(move |r| r.task == task)
    }

    /// Snapshot task states from the graph and settle the outcome.
    pub fn finalize(&mut self, graph: &DependencyGraph, cancelled: bool) -> RunOutcome {
        self.tasks = graph.summaries();
        let outcome = if cancelled {
            RunOutcome::Cancelled
        } else if self.tasks.iter().all(|t| t.state == TaskState::Succeeded) {
            RunOutcome::OverallSuccess
        } else {
            RunOutcome::OverallFailure
        };
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        outcome
    }

    pub fn task(&self, task: &str) -> Option<&TaskSummary> {
        self.tasks.iter().find(|t| t.task == task)
    }

    pub fn state_of(&self, task: &str) -> Option<TaskState> {
        self.task(task).map(|t| t.state)
    }

    /// Tasks that did not succeed (failed or skipped), in graph order.
    pub fn unsuccessful(&self) -> impl Iterator<Item = &TaskSummary> {
        self.tasks
            .iter()
            .filter(|t| matches!(t.state, TaskState::Failed | TaskState::Skipped))
    }
}

/// `scheduled__<pipeline>__<logical ts>`.
fn run_id_for(pipeline: &str, logical_ts: DateTime<Utc>) -> String {
    format!(
        "scheduled__{pipeline}__{}",
        logical_ts.format("%Y-%m-%dT%H:%M:%SZ")
    )
}
