// src/dag/task_spec.rs

//! Immutable task descriptors.

use std::fmt;
use std::sync::Arc;

use crate::dag::GraphError;
use crate::engine::TaskId;
use crate::engine::retry::RetryPolicy;
use crate::exec::Executor;
use crate::types::LoadMode;

/// Description of one unit of work in a pipeline.
///
/// Built once at pipeline-construction time through [`TaskSpecBuilder`] and
/// never mutated afterwards. Cloning is cheap: the executor is shared.
#[derive(Clone)]
pub struct TaskSpec {
    id: TaskId,
    executor: Arc<dyn Executor>,
    predecessors: Vec<TaskId>,
    target_table: Option<String>,
    load_mode: LoadMode,
    retry: RetryPolicy,
}

impl fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("id", &self.id)
            .field("executor", &self.executor.kind())
            .field("predecessors", &self.predecessors)
            .field("target_table", &self.target_table)
            .field("load_mode", &self.load_mode)
            .field("retry", &self.retry)
            .finish()
    }
}

impl TaskSpec {
    pub fn builder(id: impl Into<TaskId>, executor: Arc<dyn Executor>) -> TaskSpecBuilder {
        TaskSpecBuilder::new(id, executor)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    /// Upstream tasks declared on the spec, in declaration order.
    pub fn predecessors(&self) -> &[TaskId] {
        &self.predecessors
    }

    pub fn target_table(&self) -> Option<&str> {
        self.target_table.as_deref()
    }

    pub fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

/// Builder for [`TaskSpec`] that checks required fields in [`build`].
///
/// [`build`]: TaskSpecBuilder::build
pub struct TaskSpecBuilder {
    id: TaskId,
    executor: Arc<dyn Executor>,
    predecessors: Vec<TaskId>,
    target_table: Option<String>,
    load_mode: LoadMode,
    retry: RetryPolicy,
}

impl TaskSpecBuilder {
    pub fn new(id: impl Into<TaskId>, executor: Arc<dyn Executor>) -> Self {
        Self {
            id: id.into(),
            executor,
            predecessors: Vec::new(),
            target_table: None,
            load_mode: LoadMode::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn after(mut self, predecessor: impl Into<TaskId>) -> Self {
        self.predecessors.push(predecessor.into());
        self
    }

    pub fn after_all<I, S>(mut self, predecessors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.predecessors
            .extend(predecessors.into_iter().map(Into::into));
        self
    }

    pub fn target_table(mut self, table: impl Into<String>) -> Self {
        self.target_table = Some(table.into());
        self
    }

    pub fn load_mode(mut self, mode: LoadMode) -> Self {
        self.load_mode = mode;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate and freeze the spec.
    ///
    /// Fails when the id is blank, or when the executor needs a target table
    /// and none (or a blank one) was given. Duplicate predecessors collapse
    /// into one.
    pub fn build(self) -> Result<TaskSpec, GraphError> {
        if self.id.trim().is_empty() {
            return Err(GraphError::InvalidSpec {
                task: self.id,
                reason: "task id must not be empty".to_string(),
            });
        }

        let target_table = match self.target_table {
            Some(t) if t.trim().is_empty() => None,
            other => other,
        };

        if self.executor.requires_target_table() && target_table.is_none() {
            return Err(GraphError::InvalidSpec {
                reason: format!(
                    "{} task needs a target table",
                    self.executor.kind()
                ),
                task: self.id,
            });
        }

        let mut predecessors: Vec<TaskId> = Vec::with_capacity(self.predecessors.len());
        for p in self.predecessors {
            if !predecessors.contains(&p) {
                predecessors.push(p);
            }
        }

        Ok(TaskSpec {
            id: self.id,
            executor: self.executor,
            predecessors,
            target_table,
            load_mode: self.load_mode,
            retry: self.retry,
        })
    }
}
