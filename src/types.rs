use std::fmt;

use serde::{Deserialize, Serialize};

/// How a load task treats rows already present in its target table.
///
/// - `Append`: insert only; never truncates. Re-running duplicates rows.
/// - `Replace`: delete every existing row, then insert. Re-running is
///   idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    #[default]
    Append,
    Replace,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Append => f.write_str("append"),
            LoadMode::Replace => f.write_str("replace"),
        }
    }
}

/// Which failures the retry policy is willing to retry.
///
/// - `Any`: every failure kind is retried until the budget runs out (default).
/// - `Transient`: only warehouse/storage failures are retried; anything else
///   gives up after the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryScope {
    #[default]
    Any,
    Transient,
}

/// Classification of a failed task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Warehouse unreachable or a statement failed.
    Warehouse,
    /// Object storage unreachable.
    Storage,
    /// Access/secret pair could not be resolved.
    Credentials,
    /// Source key pattern could not be rendered.
    Template,
    /// Source records could not be interpreted.
    SourceData,
    /// A monitored table is empty or unreachable.
    QualityViolation,
    /// The task is missing a parameter its executor needs.
    MissingParameter,
    /// The executor panicked or its worker was lost.
    Internal,
}

impl FailureKind {
    /// Whether a failure of this kind is plausibly fixed by waiting.
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::Warehouse | FailureKind::Storage)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Warehouse => "warehouse",
            FailureKind::Storage => "storage",
            FailureKind::Credentials => "credentials",
            FailureKind::Template => "template",
            FailureKind::SourceData => "source_data",
            FailureKind::QualityViolation => "quality_violation",
            FailureKind::MissingParameter => "missing_parameter",
            FailureKind::Internal => "internal",
        };
        f.write_str(s)
    }
}
