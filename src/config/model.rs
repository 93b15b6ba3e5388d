// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::config::duration::parse_duration;
use crate::engine::DEFAULT_MAX_WORKERS;
use crate::engine::retry::RetryPolicy;
use crate::types::{LoadMode, RetryScope};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [defaults]
/// max_workers = 4
/// retries = 3
/// retry_delay = "5m"
///
/// [warehouse]
/// connection_env = "LOADGATE_WAREHOUSE_URL"
///
/// [pipeline.sparkify]
/// schedule = "@hourly"
///
/// [pipeline.sparkify.task.begin]
/// kind = "noop"
///
/// [pipeline.sparkify.task.stage_events]
/// kind = "stage"
/// after = ["begin"]
/// table = "staging_events"
/// bucket = "s3://udacity-dend"
/// key = "log_data/{year}/{month}"
/// ```
///
/// All sections except `[pipeline.*]` are optional and have defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub defaults: DefaultsSection,

    #[serde(default)]
    pub warehouse: WarehouseSection,

    #[serde(default)]
    pub credentials: CredentialsSection,

    /// Pipelines keyed by name.
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineConfig>,
}

/// A [`RawConfigFile`] that passed validation.
///
/// Only obtainable through `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub defaults: DefaultsSection,
    pub warehouse: WarehouseSection,
    pub credentials: CredentialsSection,
    pub pipeline: BTreeMap<String, PipelineConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            defaults: raw.defaults,
            warehouse: raw.warehouse,
            credentials: raw.credentials,
            pipeline: raw.pipeline,
        }
    }

    pub fn pipeline_names(&self) -> impl Iterator<Item = &str> {
        self.pipeline.keys().map(String::as_str)
    }
}

/// `[defaults]` section, applied to every task that does not override it.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsSection {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Additional attempts after the first one.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Fixed delay between attempts (`"500ms"`, `"30s"`, `"5m"`, `"1h"`).
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    #[serde(default)]
    pub retry_on: RetryScope,
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> String {
    "5m".to_string()
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
            retry_on: RetryScope::default(),
        }
    }
}

/// `[warehouse]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseSection {
    /// Environment variable holding the connection string.
    #[serde(default = "default_connection_env")]
    pub connection_env: String,
}

fn default_connection_env() -> String {
    "LOADGATE_WAREHOUSE_URL".to_string()
}

impl Default for WarehouseSection {
    fn default() -> Self {
        Self {
            connection_env: default_connection_env(),
        }
    }
}

/// `[credentials]` section: where to find the object-storage key pair.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsSection {
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,

    #[serde(default = "default_secret_key_env")]
    pub secret_key_env: String,
}

fn default_access_key_env() -> String {
    "AWS_ACCESS_KEY_ID".to_string()
}

fn default_secret_key_env() -> String {
    "AWS_SECRET_ACCESS_KEY".to_string()
}

impl Default for CredentialsSection {
    fn default() -> Self {
        Self {
            access_key_env: default_access_key_env(),
            secret_key_env: default_secret_key_env(),
        }
    }
}

/// `[pipeline.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Cadence for `loadgate schedule` (`"@hourly"`, `"0 * * * *"`,
    /// `"every 30m"`).
    #[serde(default)]
    pub schedule: Option<String>,

    /// Overrides `defaults.max_workers` for this pipeline.
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Tasks keyed by id.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[pipeline.<name>.task.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// This task waits for every task listed here.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub retries: Option<u32>,

    #[serde(default)]
    pub retry_delay: Option<String>,

    #[serde(default)]
    pub retry_on: Option<RetryScope>,

    #[serde(flatten)]
    pub kind: TaskKindConfig,
}

/// Executor-specific settings, selected by `kind = "..."`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskKindConfig {
    Noop,

    Stage {
        table: String,
        bucket: String,
        /// Key pattern, may use `{ds}`, `{year}`, ... placeholders.
        #[serde(default)]
        key: String,
        #[serde(default)]
        json_path: Option<String>,
        #[serde(default)]
        region: Option<String>,
    },

    Load {
        table: String,
        query: String,
        #[serde(default)]
        mode: LoadMode,
    },

    Quality {
        tables: Vec<String>,
    },
}

impl TaskKindConfig {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKindConfig::Noop => "noop",
            TaskKindConfig::Stage { .. } => "stage",
            TaskKindConfig::Load { .. } => "load",
            TaskKindConfig::Quality { .. } => "quality",
        }
    }
}

impl DefaultsSection {
    /// Effective retry policy for a task: per-task overrides on top of these
    /// defaults.
    pub fn retry_policy_for(&self, task: &TaskConfig) -> Result<RetryPolicy, String> {
        let delay = parse_duration(task.retry_delay.as_deref().unwrap_or(&self.retry_delay))?;
        Ok(
            RetryPolicy::new(task.retries.unwrap_or(self.retries), delay)
                .with_scope(task.retry_on.unwrap_or(self.retry_on)),
        )
    }
}
