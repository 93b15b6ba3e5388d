// src/exec/executor.rs

//! Pluggable executor capability.
//!
//! The engine never knows what a task does: it hands a [`TaskContext`] to the
//! task's [`Executor`] and records whatever comes back. Production pipelines
//! use the built-in executors; tests can provide their own implementation
//! that, for example, records dispatch times or fails on demand.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::engine::TaskId;
use crate::engine::report::Diagnostics;
use crate::storage::{CredentialError, TemplateError};
use crate::types::{FailureKind, LoadMode};
use crate::warehouse::{Rows, Statement, Warehouse, WarehouseError};

/// Everything an executor knows about the attempt it is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskContext {
    pub run_id: String,
    pub pipeline: String,
    pub task: TaskId,
    /// 1-based attempt number.
    pub attempt: u32,
    pub logical_ts: DateTime<Utc>,
    pub target_table: Option<String>,
    pub load_mode: LoadMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Noop,
    Stage,
    Load,
    Quality,
    /// Anything defined outside this crate.
    Custom(&'static str),
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Noop => f.write_str("noop"),
            ExecutorKind::Stage => f.write_str("stage"),
            ExecutorKind::Load => f.write_str("load"),
            ExecutorKind::Quality => f.write_str("quality"),
            ExecutorKind::Custom(name) => f.write_str(name),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("object storage error: {0}")]
    Storage(String),

    #[error("credential resolution failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("malformed source data: {0}")]
    SourceData(String),

    #[error("data quality check failed on table {table}: {reason}")]
    QualityViolation { table: String, reason: String },

    #[error("missing parameter: {0}")]
    MissingParameter(String),
}

impl ExecutorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecutorError::Warehouse(_) => FailureKind::Warehouse,
            ExecutorError::Storage(_) => FailureKind::Storage,
            ExecutorError::Credentials(_) => FailureKind::Credentials,
            ExecutorError::Template(_) => FailureKind::Template,
            ExecutorError::SourceData(_) => FailureKind::SourceData,
            ExecutorError::QualityViolation { .. } => FailureKind::QualityViolation,
            ExecutorError::MissingParameter(_) => FailureKind::MissingParameter,
        }
    }
}

/// Performs one task's side effect.
///
/// Implementations must be safe to invoke again for a retry: every attempt
/// gets a fresh [`TaskContext`] and should acquire its own resources.
#[async_trait]
pub trait Executor: Send + Sync + fmt::Debug {
    fn kind(&self) -> ExecutorKind;

    /// Whether the task must name a target table.
    fn requires_target_table(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<Diagnostics, ExecutorError>;
}

/// Target table from the context, or a `MissingParameter` failure.
pub(crate) fn require_table(ctx: &TaskContext) -> Result<&str, ExecutorError> {
    ctx.target_table
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            ExecutorError::MissingParameter(format!("task '{}' has no target table", ctx.task))
        })
}

/// `SELECT COUNT(*)` on `table`, parsed.
pub(crate) async fn row_count(
    session: &mut dyn Warehouse,
    table: &str,
) -> Result<u64, ExecutorError> {
    let rows = session
        .query(&Statement::CountRows {
            table: table.to_string(),
        })
        .await?;
    parse_count(&rows).map_err(ExecutorError::SourceData)
}

/// First column of the first row as a count.
pub(crate) fn parse_count(rows: &Rows) -> Result<u64, String> {
    let cell = rows
        .first()
        .and_then(|row| row.first())
        .ok_or_else(|| "count query returned no rows".to_string())?;
    let text = cell
        .as_deref()
        .ok_or_else(|| "count query returned NULL".to_string())?;
    text.trim()
        .parse::<u64>()
        .map_err(|e| format!("count '{text}' is not a number: {e}"))
}
