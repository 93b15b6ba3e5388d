// src/warehouse/statement.rs

use std::fmt;

/// Statements issued by the built-in executors.
#[derive(Clone, PartialEq, Eq)]
pub enum Statement {
    /// `DELETE FROM <table>`.
    DeleteAll { table: String },
    /// `INSERT INTO <table> <query>`.
    InsertSelect { table: String, query: String },
    /// Bulk copy of JSON records from object storage.
    CopyJson {
        table: String,
        source: String,
        access_key: String,
        secret_key: String,
        json_path: String,
        region: String,
    },
    /// `SELECT COUNT(*) FROM <table>`.
    CountRows { table: String },
}

impl Statement {
    /// The table this statement touches, if any.
    pub fn table(&self) -> &str {
        match self {
            Statement::DeleteAll { table }
            | Statement::InsertSelect { table, .. }
            | Statement::CopyJson { table, .. }
            | Statement::CountRows { table } => table,
        }
    }

    /// SQL safe to log: credentials are masked.
    pub fn redacted(&self) -> String {
        match self {
            Statement::CopyJson {
                table,
                source,
                json_path,
                region,
                ..
            } => render_copy(table, source, "****", "****", json_path, region),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::DeleteAll { table } => write!(f, "DELETE FROM {table}"),
            Statement::InsertSelect { table, query } => {
                write!(f, "INSERT INTO {table}\n{};", query.trim().trim_end_matches(';'))
            }
            Statement::CopyJson {
                table,
                source,
                access_key,
                secret_key,
                json_path,
                region,
            } => f.write_str(&render_copy(
                table, source, access_key, secret_key, json_path, region,
            )),
            Statement::CountRows { table } => write!(f, "SELECT COUNT(*) FROM {table}"),
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

fn render_copy(
    table: &str,
    source: &str,
    access_key: &str,
    secret_key: &str,
    json_path: &str,
    region: &str,
) -> String {
    format!(
        "COPY {table}\n\
         FROM '{source}'\n\
         ACCESS_KEY_ID '{access_key}'\n\
         SECRET_ACCESS_KEY '{secret_key}'\n\
         FORMAT AS JSON '{json_path}'\n\
         REGION '{region}'\n\
         TIMEFORMAT 'epochmillisecs'"
    )
}
