// src/exec/mod.rs

//! Task execution layer.
//!
//! This module is responsible for actually performing each task's side
//! effect and turning the outcome into a [`crate::engine::TaskResult`].
//!
//! - [`executor`] provides the [`Executor`] capability trait, the
//!   [`TaskContext`] handed to it, and the [`ExecutorError`] taxonomy.
//! - [`task_runner`] runs one attempt on its own Tokio task, timing it and
//!   turning panics into failures.
//! - [`noop`], [`stage`], [`load`] and [`quality`] are the built-in
//!   executors.

pub mod executor;
pub mod load;
pub mod noop;
pub mod quality;
pub mod stage;
pub mod task_runner;

pub use executor::{Executor, ExecutorError, ExecutorKind, TaskContext};
pub use load::LoadExecutor;
pub use noop::NoopExecutor;
pub use quality::QualityExecutor;
pub use stage::StageExecutor;
