// src/warehouse/postgres.rs

//! Warehouse sessions over `tokio-postgres`.

use std::fmt;

use async_trait::async_trait;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, warn};

use super::{Rows, Statement, Warehouse, WarehouseConnector, WarehouseError};

/// Connects with a libpq-style connection string
/// (`host=... port=5439 user=... password=... dbname=...`) or URL.
#[derive(Clone)]
pub struct PostgresConnector {
    conn_str: String,
}

impl PostgresConnector {
    pub fn new(conn_str: impl Into<String>) -> Self {
        Self {
            conn_str: conn_str.into(),
        }
    }
}

impl fmt::Debug for PostgresConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The connection string usually embeds a password.
        f.debug_struct("PostgresConnector").finish_non_exhaustive()
    }
}

#[async_trait]
impl WarehouseConnector for PostgresConnector {
    async fn connect(&self) -> Result<Box<dyn Warehouse>, WarehouseError> {
        let (client, connection) = tokio_postgres::connect(&self.conn_str, NoTls)
            .await
            .map_err(|e| WarehouseError::Connect(format_pg_error(&e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "warehouse connection closed with error");
            }
        });

        Ok(Box::new(PostgresSession { client }))
    }
}

struct PostgresSession {
    client: Client,
}

#[async_trait]
impl Warehouse for PostgresSession {
    async fn run(&mut self, statement: &Statement) -> Result<(), WarehouseError> {
        debug!(sql = %statement.redacted(), "running statement");
        self.client
            .batch_execute(&statement.to_string())
            .await
            .map_err(|e| WarehouseError::Statement(format_pg_error(&e)))
    }

    async fn query(&mut self, statement: &Statement) -> Result<Rows, WarehouseError> {
        debug!(sql = %statement.redacted(), "running query");
        let messages = self
            .client
            .simple_query(&statement.to_string())
            .await
            .map_err(|e| WarehouseError::Statement(format_pg_error(&e)))?;

        let rows = messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(
                    (0..row.len())
                        .map(|i| row.get(i).map(str::to_string))
                        .collect(),
                ),
                _ => None,
            })
            .collect();
        Ok(rows)
    }
}

fn format_pg_error(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db) => format!("{} (sqlstate={})", db.message(), db.code().code()),
        None => error.to_string(),
    }
}
