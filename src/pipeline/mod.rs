// src/pipeline/mod.rs

//! Pipeline definitions: an immutable task graph plus the options a run of
//! it needs.
//!
//! - [`definition`] holds [`PipelineDefinition`] and the TOML-driven builder.
//! - [`sparkify`] wires the fixed staging → fact → dimensions → quality gate
//!   graph in code.

pub mod definition;
pub mod sparkify;

pub use definition::PipelineDefinition;
pub use sparkify::{SparkifyParams, SparkifyQueries, sparkify};
