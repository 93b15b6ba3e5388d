// src/pipeline/definition.rs

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::{ConfigFile, TaskConfig, TaskKindConfig};
use crate::dag::{DependencyGraph, GraphError, TaskSpec};
use crate::engine::{DEFAULT_MAX_WORKERS, RunnerOptions};
use crate::errors::{LoadgateError, Result};
use crate::exec::{Executor, LoadExecutor, NoopExecutor, QualityExecutor, StageExecutor};
use crate::schedule::Cadence;
use crate::storage::{CredentialProvider, S3Location};
use crate::types::LoadMode;
use crate::warehouse::WarehouseConnector;

/// A named, fully wired pipeline.
///
/// The graph held here is a template that never runs: each run gets its own
/// copy from [`PipelineDefinition::new_run_graph`], so task state never leaks
/// from one run into the next.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    max_workers: usize,
    schedule: Option<Cadence>,
    graph: DependencyGraph,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, graph: DependencyGraph) -> Self {
        Self {
            name: name.into(),
            max_workers: DEFAULT_MAX_WORKERS,
            schedule: None,
            graph,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    pub fn with_schedule(mut self, cadence: Cadence) -> Self {
        self.schedule = Some(cadence);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn schedule(&self) -> Option<Cadence> {
        self.schedule
    }

    /// The template graph (every task Pending or Ready, nothing started).
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Fresh graph for one run.
    pub fn new_run_graph(&self) -> DependencyGraph {
        self.graph.clone()
    }

    pub fn runner_options(&self, logical_ts: DateTime<Utc>) -> RunnerOptions {
        RunnerOptions::new(self.name.clone(), logical_ts).with_max_workers(self.max_workers)
    }

    /// Build the pipeline `name` from a validated config.
    ///
    /// Tasks are added dependencies-first; among tasks whose dependencies are
    /// all in place, ids are added in lexical order.
    pub fn from_config(
        cfg: &ConfigFile,
        name: &str,
        connector: Arc<dyn WarehouseConnector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        let pipeline = cfg
            .pipeline
            .get(name)
            .ok_or_else(|| LoadgateError::PipelineNotFound(name.to_string()))?;

        let mut graph = DependencyGraph::new();
        let mut remaining: BTreeMap<&str, &TaskConfig> =
            pipeline.task.iter().map(|(id, t)| (id.as_str(), t)).collect();

        while !remaining.is_empty() {
            let wave: Vec<&str> = remaining
                .iter()
                .filter(|(_, task)| task.after.iter().all(|dep| graph.contains(dep)))
                .map(|(id, _)| *id)
                .collect();

            let Some(first) = remaining.keys().next().copied() else {
                break;
            };
            if wave.is_empty() {
                return Err(GraphError::Cycle {
                    task: first.to_string(),
                    detail: "tasks depend on each other through `after`".to_string(),
                }
                .into());
            }

            for id in wave {
                let Some(task) = remaining.remove(id) else {
                    continue;
                };
                let spec = build_spec(cfg, id, task, &connector, &credentials)?;
                debug!(pipeline = name, task = id, kind = task.kind.name(), "adding task");
                graph.add_task(spec)?;
            }
        }

        let mut definition = PipelineDefinition::new(name, graph)
            .with_max_workers(pipeline.max_workers.unwrap_or(cfg.defaults.max_workers));
        if let Some(schedule) = &pipeline.schedule {
            let cadence = Cadence::from_str(schedule).map_err(|e| {
                LoadgateError::ConfigError(format!("[pipeline.{name}].schedule: {e}"))
            })?;
            definition = definition.with_schedule(cadence);
        }

        Ok(definition)
    }
}

fn build_spec(
    cfg: &ConfigFile,
    id: &str,
    task: &TaskConfig,
    connector: &Arc<dyn WarehouseConnector>,
    credentials: &Arc<dyn CredentialProvider>,
) -> Result<TaskSpec> {
    let retry = cfg
        .defaults
        .retry_policy_for(task)
        .map_err(|e| LoadgateError::ConfigError(format!("task '{id}': {e}")))?;

    let (executor, table, mode): (Arc<dyn Executor>, Option<&String>, Option<LoadMode>) =
        match &task.kind {
            TaskKindConfig::Noop => (Arc::new(NoopExecutor) as Arc<dyn Executor>, None, None),
            TaskKindConfig::Stage {
                table,
                bucket,
                key,
                json_path,
                region,
            } => {
                let mut location = S3Location::new(bucket.clone(), key.clone());
                if let Some(json_path) = json_path {
                    location = location.with_json_path(json_path.clone());
                }
                if let Some(region) = region {
                    location = location.with_region(region.clone());
                }
                let executor = StageExecutor::new(location, credentials.clone(), connector.clone());
                (Arc::new(executor) as Arc<dyn Executor>, Some(table), None)
            }
            TaskKindConfig::Load { table, query, mode } => (
                Arc::new(LoadExecutor::new(query.clone(), connector.clone())) as Arc<dyn Executor>,
                Some(table),
                Some(*mode),
            ),
            TaskKindConfig::Quality { tables } => (
                Arc::new(QualityExecutor::new(tables.iter().cloned(), connector.clone()))
                    as Arc<dyn Executor>,
                None,
                None,
            ),
        };

    let mut builder = TaskSpec::builder(id, executor)
        .after_all(task.after.iter().cloned())
        .retry(retry);
    if let Some(table) = table {
        builder = builder.target_table(table.clone());
    }
    if let Some(mode) = mode {
        builder = builder.load_mode(mode);
    }

    Ok(builder.build()?)
}
