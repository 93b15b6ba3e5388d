#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use loadgate::config::{
    ConfigFile, CredentialsSection, DefaultsSection, PipelineConfig, RawConfigFile, TaskConfig,
    TaskKindConfig, WarehouseSection,
};
use loadgate::dag::{DependencyGraph, TaskSpec};
use loadgate::engine::RetryPolicy;
use loadgate::exec::Executor;
use loadgate::pipeline::sparkify::{self, SparkifyParams, SparkifyQueries};
use loadgate::pipeline::{PipelineDefinition, sparkify as build_sparkify};
use loadgate::storage::{Credentials, StaticCredentials};
use loadgate::types::LoadMode;

use crate::memory_warehouse::{MemoryWarehouse, rows};
use crate::scripted_executor::{DispatchLog, Script, ScriptedExecutor};

/// The Sparkify shape as `(task, predecessors)`, dependencies first.
pub const SPARKIFY_SHAPE: [(&str, &[&str]); 10] = [
    (sparkify::BEGIN, &[]),
    (sparkify::STAGE_EVENTS, &[sparkify::BEGIN]),
    (sparkify::STAGE_SONGS, &[sparkify::BEGIN]),
    (
        sparkify::LOAD_SONGPLAYS,
        &[sparkify::STAGE_EVENTS, sparkify::STAGE_SONGS],
    ),
    (sparkify::LOAD_USERS, &[sparkify::LOAD_SONGPLAYS]),
    (sparkify::LOAD_SONGS, &[sparkify::LOAD_SONGPLAYS]),
    (sparkify::LOAD_ARTISTS, &[sparkify::LOAD_SONGPLAYS]),
    (sparkify::LOAD_TIME, &[sparkify::LOAD_SONGPLAYS]),
    (
        sparkify::QUALITY_GATE,
        &[
            sparkify::LOAD_USERS,
            sparkify::LOAD_SONGS,
            sparkify::LOAD_ARTISTS,
            sparkify::LOAD_TIME,
        ],
    ),
    (sparkify::END, &[sparkify::QUALITY_GATE]),
];

/// Spec with the given predecessors and retry policy.
pub fn spec(id: &str, executor: Arc<dyn Executor>, after: &[&str], retry: RetryPolicy) -> TaskSpec {
    TaskSpec::builder(id, executor)
        .after_all(after.iter().copied())
        .retry(retry)
        .build()
        .expect("valid test spec")
}

/// Graph from `(task, predecessors)` pairs sharing one executor, no retries.
pub fn graph_of(tasks: &[(&str, &[&str])], executor: Arc<dyn Executor>) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (id, after) in tasks {
        graph
            .add_task(spec(id, executor.clone(), after, RetryPolicy::none()))
            .expect("valid test graph");
    }
    graph
}

/// The Sparkify shape with scripted executors. Every task succeeds unless
/// listed in `overrides`.
pub fn scripted_sparkify(
    log: &DispatchLog,
    retry: RetryPolicy,
    overrides: &[(&str, Script)],
) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for (id, after) in SPARKIFY_SHAPE {
        let script = overrides
            .iter()
            .find(|(task, _)| *task == id)
            .map(|(_, s)| s.clone())
            .unwrap_or(Script::Succeed);
        let executor: Arc<dyn Executor> = Arc::new(ScriptedExecutor::new(script, log));
        graph
            .add_task(spec(id, executor, after, retry))
            .expect("valid sparkify shape");
    }
    graph
}

/// The real Sparkify pipeline over a seeded [`MemoryWarehouse`].
pub struct SparkifyFixture {
    pub warehouse: MemoryWarehouse,
    pub queries: SparkifyQueries,
    pub definition: PipelineDefinition,
}

impl SparkifyFixture {
    /// Every source and query yields rows, so a run succeeds.
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        let warehouse = MemoryWarehouse::new();
        let credentials = Arc::new(StaticCredentials(Credentials::new("AKIATEST", "s3cr3t")));
        let mut params = SparkifyParams::new(warehouse.connector(), credentials);
        params.retry = retry;

        let queries = params.queries.clone();
        warehouse.set_source("s3://udacity-dend/log_data", rows(8));
        warehouse.set_source("s3://udacity-dend/song_data", rows(5));
        warehouse.set_source(&queries.songplays, rows(6));
        warehouse.set_source(&queries.users, rows(3));
        warehouse.set_source(&queries.songs, rows(5));
        warehouse.set_source(&queries.artists, rows(4));
        warehouse.set_source(&queries.time, rows(6));

        let definition = build_sparkify(params).expect("sparkify wiring is valid");
        Self {
            warehouse,
            queries,
            definition,
        }
    }
}

impl Default for SparkifyFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                defaults: DefaultsSection::default(),
                warehouse: WarehouseSection::default(),
                credentials: CredentialsSection::default(),
                pipeline: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, pipeline: &str, id: &str, task: TaskConfig) -> Self {
        self.config
            .pipeline
            .entry(pipeline.to_string())
            .or_insert_with(|| PipelineConfig {
                schedule: None,
                max_workers: None,
                task: BTreeMap::new(),
            })
            .task
            .insert(id.to_string(), task);
        self
    }

    pub fn with_schedule(mut self, pipeline: &str, schedule: &str) -> Self {
        if let Some(p) = self.config.pipeline.get_mut(pipeline) {
            p.schedule = Some(schedule.to_string());
        }
        self
    }

    pub fn with_default_retries(mut self, retries: u32, delay: &str) -> Self {
        self.config.defaults.retries = retries;
        self.config.defaults.retry_delay = delay.to_string();
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    fn with_kind(kind: TaskKindConfig) -> Self {
        Self {
            task: TaskConfig {
                after: vec![],
                retries: None,
                retry_delay: None,
                retry_on: None,
                kind,
            },
        }
    }

    pub fn noop() -> Self {
        Self::with_kind(TaskKindConfig::Noop)
    }

    pub fn stage(table: &str, bucket: &str, key: &str) -> Self {
        Self::with_kind(TaskKindConfig::Stage {
            table: table.to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            json_path: None,
            region: None,
        })
    }

    pub fn load(table: &str, query: &str, mode: LoadMode) -> Self {
        Self::with_kind(TaskKindConfig::Load {
            table: table.to_string(),
            query: query.to_string(),
            mode,
        })
    }

    pub fn quality(tables: &[&str]) -> Self {
        Self::with_kind(TaskKindConfig::Quality {
            tables: tables.iter().map(|t| t.to_string()).collect(),
        })
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.task.retries = Some(retries);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
