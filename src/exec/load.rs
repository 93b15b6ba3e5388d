// src/exec/load.rs

//! Populate a fact or dimension table from a query over other tables.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::engine::report::Diagnostics;
use crate::types::LoadMode;
use crate::warehouse::{Statement, WarehouseConnector};

use super::executor::{require_table, row_count};
use super::{Executor, ExecutorError, ExecutorKind, TaskContext};

/// `INSERT INTO <table> <query>`, preceded by `DELETE FROM <table>` when the
/// task's load mode is [`LoadMode::Replace`].
///
/// In [`LoadMode::Append`] every successful attempt adds the query's rows
/// again, so re-running duplicates data.
#[derive(Debug, Clone)]
pub struct LoadExecutor {
    query: String,
    connector: Arc<dyn WarehouseConnector>,
}

impl LoadExecutor {
    pub fn new(query: impl Into<String>, connector: Arc<dyn WarehouseConnector>) -> Self {
        Self {
            query: query.into(),
            connector,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[async_trait]
impl Executor for LoadExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Load
    }

    fn requires_target_table(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<Diagnostics, ExecutorError> {
        let table = require_table(ctx)?;
        if self.query.trim().is_empty() {
            return Err(ExecutorError::MissingParameter(format!(
                "task '{}' has no query",
                ctx.task
            )));
        }

        let mut session = self.connector.connect().await?;

        if ctx.load_mode == LoadMode::Replace {
            info!(task = %ctx.task, table, "deleting existing rows");
            session
                .run(&Statement::DeleteAll {
                    table: table.to_string(),
                })
                .await?;
        }

        info!(task = %ctx.task, table, mode = %ctx.load_mode, "loading table");
        session
            .run(&Statement::InsertSelect {
                table: table.to_string(),
                query: self.query.clone(),
            })
            .await?;

        let count = row_count(session.as_mut(), table).await?;
        info!(task = %ctx.task, table, rows = count, "load complete");

        Ok(Diagnostics::default().with_row_count(table, count))
    }
}
