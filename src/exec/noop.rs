// src/exec/noop.rs

use async_trait::async_trait;

use crate::engine::report::Diagnostics;

use super::{Executor, ExecutorError, ExecutorKind, TaskContext};

/// Does nothing and succeeds. Used for the `begin`/`end` markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExecutor;

#[async_trait]
impl Executor for NoopExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Noop
    }

    async fn execute(&self, _ctx: &TaskContext) -> Result<Diagnostics, ExecutorError> {
        Ok(Diagnostics::default())
    }
}
