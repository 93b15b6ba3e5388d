// src/config/mod.rs

//! Configuration loading and validation for loadgate.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate pipelines before anything runs (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{
    ConfigFile, CredentialsSection, DefaultsSection, PipelineConfig, RawConfigFile, TaskConfig,
    TaskKindConfig, WarehouseSection,
};
