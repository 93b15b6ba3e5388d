// src/exec/stage.rs

//! Bulk-load JSON records from object storage into a staging table.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::engine::report::Diagnostics;
use crate::storage::{CredentialProvider, S3Location};
use crate::warehouse::{Statement, WarehouseConnector};

use super::executor::{require_table, row_count};
use super::{Executor, ExecutorError, ExecutorKind, TaskContext};

/// Replaces the staging table's contents with a `COPY` from `location`.
///
/// Staging always replaces: the table is emptied before the copy regardless
/// of the task's load mode, so a retried attempt starts from scratch.
#[derive(Debug, Clone)]
pub struct StageExecutor {
    location: S3Location,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn WarehouseConnector>,
}

impl StageExecutor {
    pub fn new(
        location: S3Location,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn WarehouseConnector>,
    ) -> Self {
        Self {
            location,
            credentials,
            connector,
        }
    }

    pub fn location(&self) -> &S3Location {
        &self.location
    }
}

#[async_trait]
impl Executor for StageExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Stage
    }

    fn requires_target_table(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<Diagnostics, ExecutorError> {
        let table = require_table(ctx)?;
        let credentials = self.credentials.resolve()?;
        let source = self.location.source_path(ctx.logical_ts)?;

        let mut session = self.connector.connect().await?;

        info!(task = %ctx.task, table, "clearing staging table");
        session
            .run(&Statement::DeleteAll {
                table: table.to_string(),
            })
            .await?;

        info!(task = %ctx.task, table, source = %source, "copying source records");
        session
            .run(&Statement::CopyJson {
                table: table.to_string(),
                source: source.clone(),
                access_key: credentials.access_key,
                secret_key: credentials.secret_key,
                json_path: self.location.json_path().to_string(),
                region: self.location.region.clone(),
            })
            .await
            .map_err(|e| ExecutorError::Storage(format!("copy from {source} failed: {e}")))?;

        let count = row_count(session.as_mut(), table).await?;
        info!(task = %ctx.task, table, rows = count, "staging complete");

        Ok(Diagnostics::default()
            .with_row_count(table, count)
            .with_note(format!("source {source}")))
    }
}
