// src/errors.rs

//! Crate-wide error types.
//!
//! Per-layer errors live next to the code that raises them
//! ([`GraphError`], [`crate::exec::ExecutorError`],
//! [`crate::warehouse::WarehouseError`], [`crate::storage::CredentialError`]);
//! [`LoadgateError`] is what crosses the library boundary.

use thiserror::Error;

pub use crate::dag::GraphError;

#[derive(Error, Debug)]
pub enum LoadgateError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid task graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Unknown pipeline: {0}")]
    PipelineNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoadgateError {
    /// Configuration errors abort before any task is scheduled and get their
    /// own exit code.
    pub fn is_configuration(&self) -> bool {
        match self {
            LoadgateError::ConfigError(_)
            | LoadgateError::PipelineNotFound(_)
            | LoadgateError::TomlError(_) => true,
            LoadgateError::Graph(e) => e.is_configuration(),
            LoadgateError::IoError(_) | LoadgateError::Other(_) => false,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() {
            crate::EXIT_CONFIGURATION
        } else {
            crate::EXIT_FAILURE
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LoadgateError>;
