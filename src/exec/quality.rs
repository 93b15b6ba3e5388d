// src/exec/quality.rs

//! Table-level data quality assertions.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::engine::report::Diagnostics;
use crate::warehouse::{Statement, WarehouseConnector};

use super::executor::parse_count;
use super::{Executor, ExecutorError, ExecutorKind, TaskContext};

/// Asserts that every monitored table is reachable and non-empty.
///
/// Tables are checked in order and the first violation fails the task.
#[derive(Debug, Clone)]
pub struct QualityExecutor {
    tables: Vec<String>,
    connector: Arc<dyn WarehouseConnector>,
}

impl QualityExecutor {
    pub fn new<I, S>(tables: I, connector: Arc<dyn WarehouseConnector>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            connector,
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

#[async_trait]
impl Executor for QualityExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Quality
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<Diagnostics, ExecutorError> {
        if self.tables.is_empty() {
            return Err(ExecutorError::MissingParameter(format!(
                "task '{}' monitors no tables",
                ctx.task
            )));
        }

        let mut session = self.connector.connect().await?;
        let mut diagnostics = Diagnostics::default();

        for table in &self.tables {
            let violation = |reason: String| {
                error!(task = %ctx.task, table = %table, reason = %reason, "quality check failed");
                ExecutorError::QualityViolation {
                    table: table.clone(),
                    reason,
                }
            };

            let rows = session
                .query(&Statement::CountRows {
                    table: table.clone(),
                })
                .await
                .map_err(|e| violation(format!("table unreachable: {e}")))?;

            let count = parse_count(&rows).map_err(violation)?;
            if count == 0 {
                return Err(violation("table has zero rows".to_string()));
            }

            info!(task = %ctx.task, table = %table, rows = count, "table passed");
            diagnostics = diagnostics.with_row_count(table.clone(), count);
        }

        Ok(diagnostics)
    }
}
