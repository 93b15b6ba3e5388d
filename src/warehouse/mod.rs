// src/warehouse/mod.rs

//! Warehouse capability.
//!
//! Executors never build SQL strings themselves; they issue typed
//! [`Statement`]s through a [`Warehouse`] session obtained from a
//! [`WarehouseConnector`]. Sessions are acquired per task invocation and
//! dropped when the executor returns, whether it succeeded or not.
//!
//! - [`statement`] renders statements to Redshift SQL.
//! - [`postgres`] is the production connector (Redshift speaks the Postgres
//!   wire protocol).

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub mod postgres;
pub mod statement;

pub use postgres::PostgresConnector;
pub use statement::Statement;

/// One result row; `None` is SQL `NULL`.
pub type Row = Vec<Option<String>>;
pub type Rows = Vec<Row>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WarehouseError {
    #[error("could not connect to warehouse: {0}")]
    Connect(String),

    #[error("statement failed: {0}")]
    Statement(String),
}

/// An open warehouse session.
#[async_trait]
pub trait Warehouse: Send {
    /// Execute a statement, discarding any result.
    async fn run(&mut self, statement: &Statement) -> Result<(), WarehouseError>;

    /// Execute a statement and return its rows as text.
    async fn query(&mut self, statement: &Statement) -> Result<Rows, WarehouseError>;
}

/// Opens warehouse sessions.
#[async_trait]
pub trait WarehouseConnector: Send + Sync + fmt::Debug {
    async fn connect(&self) -> Result<Box<dyn Warehouse>, WarehouseError>;
}
