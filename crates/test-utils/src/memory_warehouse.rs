use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use loadgate::warehouse::{
    Rows, Statement, Warehouse, WarehouseConnector, WarehouseError,
};

/// One statement seen by the warehouse, with the (virtual) time it ran.
#[derive(Debug, Clone)]
pub struct StatementRecord {
    pub at: Instant,
    pub statement: Statement,
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Vec<Vec<String>>>,
    /// Rows produced by an `INSERT ... <query>` (keyed by query text) or a
    /// `COPY ... FROM '<source>'` (keyed by source path).
    sources: HashMap<String, Vec<Vec<String>>>,
    unreachable: HashSet<String>,
    connect_failures: u32,
    connects: u32,
    log: Vec<StatementRecord>,
}

/// In-memory stand-in for the warehouse.
///
/// Cloning shares the underlying state, so a test keeps one handle for
/// assertions and hands another to the pipeline as its connector.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<State>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// As a connector trait object.
    pub fn connector(&self) -> Arc<dyn WarehouseConnector> {
        Arc::new(self.clone())
    }

    /// Create (or overwrite) a table with the given rows.
    pub fn with_table(self, table: &str, rows: Vec<Vec<String>>) -> Self {
        self.state.lock().unwrap().tables.insert(table.to_string(), rows);
        self
    }

    /// Rows an `INSERT` with `query`, or a `COPY` from `source`, produces.
    pub fn with_source(self, key: &str, rows: Vec<Vec<String>>) -> Self {
        self.set_source(key, rows);
        self
    }

    pub fn set_source(&self, key: &str, rows: Vec<Vec<String>>) {
        self.state.lock().unwrap().sources.insert(key.to_string(), rows);
    }

    /// Every statement touching `table` fails until [`Self::make_reachable`].
    pub fn make_unreachable(&self, table: &str) {
        self.state.lock().unwrap().unreachable.insert(table.to_string());
    }

    pub fn make_reachable(&self, table: &str) {
        self.state.lock().unwrap().unreachable.remove(table);
    }

    /// The next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.state.lock().unwrap().connect_failures = n;
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn connect_count(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub fn statements(&self) -> Vec<StatementRecord> {
        self.state.lock().unwrap().log.clone()
    }

    /// Times at which `SELECT COUNT(*) FROM <table>` ran.
    pub fn counts_of(&self, table: &str) -> Vec<Instant> {
        self.statements()
            .into_iter()
            .filter(|r| matches!(&r.statement, Statement::CountRows { table: t } if t == table))
            .map(|r| r.at)
            .collect()
    }

    fn execute(&self, statement: &Statement) -> Result<Rows, WarehouseError> {
        debug!(sql = %statement.redacted(), "memory warehouse statement");
        let mut state = self.state.lock().unwrap();
        state.log.push(StatementRecord {
            at: Instant::now(),
            statement: statement.clone(),
        });

        let table = statement.table();
        if state.unreachable.contains(table) {
            return Err(WarehouseError::Statement(format!(
                "relation \"{table}\" is unreachable"
            )));
        }

        match statement {
            Statement::DeleteAll { table } => {
                state.tables.entry(table.clone()).or_default().clear();
                Ok(Vec::new())
            }
            Statement::InsertSelect { table, query } => {
                let rows = state.sources.get(query).cloned().ok_or_else(|| {
                    WarehouseError::Statement(format!("no source rows for query: {query}"))
                })?;
                state.tables.entry(table.clone()).or_default().extend(rows);
                Ok(Vec::new())
            }
            Statement::CopyJson { table, source, .. } => {
                let rows = state.sources.get(source).cloned().ok_or_else(|| {
                    WarehouseError::Statement(format!("S3 source {source} does not exist"))
                })?;
                state.tables.entry(table.clone()).or_default().extend(rows);
                Ok(Vec::new())
            }
            Statement::CountRows { table } => {
                let rows = state.tables.get(table).ok_or_else(|| {
                    WarehouseError::Statement(format!("relation \"{table}\" does not exist"))
                })?;
                Ok(vec![vec![Some(rows.len().to_string())]])
            }
        }
    }
}

#[async_trait]
impl WarehouseConnector for MemoryWarehouse {
    async fn connect(&self) -> Result<Box<dyn Warehouse>, WarehouseError> {
        {
            let mut state = self.state.lock().unwrap();
            state.connects += 1;
            if state.connect_failures > 0 {
                state.connect_failures -= 1;
                return Err(WarehouseError::Connect("connection refused".to_string()));
            }
        }
        Ok(Box::new(MemorySession {
            warehouse: self.clone(),
        }))
    }
}

struct MemorySession {
    warehouse: MemoryWarehouse,
}

#[async_trait]
impl Warehouse for MemorySession {
    async fn run(&mut self, statement: &Statement) -> Result<(), WarehouseError> {
        self.warehouse.execute(statement).map(|_| ())
    }

    async fn query(&mut self, statement: &Statement) -> Result<Rows, WarehouseError> {
        self.warehouse.execute(statement)
    }
}

/// `n` single-column rows `"row-0"`, `"row-1"`, ...
pub fn rows(n: usize) -> Vec<Vec<String>> {
    (0..n).map(|i| vec![format!("row-{i}")]).collect()
}
