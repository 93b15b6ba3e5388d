// src/config/validate.rs

use chrono::Utc;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, PipelineConfig, RawConfigFile, TaskKindConfig};
use crate::dag::GraphError;
use crate::errors::{LoadgateError, Result};
use crate::schedule::Cadence;
use crate::storage::S3Location;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = LoadgateError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_pipelines(cfg)?;
    validate_defaults(cfg)?;
    for (name, pipeline) in cfg.pipeline.iter() {
        validate_pipeline(cfg, name, pipeline)?;
    }
    Ok(())
}

fn ensure_has_pipelines(cfg: &RawConfigFile) -> Result<()> {
    if cfg.pipeline.is_empty() {
        return Err(LoadgateError::ConfigError(
            "config must contain at least one [pipeline.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_defaults(cfg: &RawConfigFile) -> Result<()> {
    if cfg.defaults.max_workers == 0 {
        return Err(LoadgateError::ConfigError(
            "[defaults].max_workers must be >= 1 (got 0)".to_string(),
        ));
    }
    parse_duration(&cfg.defaults.retry_delay)
        .map_err(|e| LoadgateError::ConfigError(format!("[defaults].retry_delay: {e}")))?;
    if cfg.warehouse.connection_env.trim().is_empty() {
        return Err(LoadgateError::ConfigError(
            "[warehouse].connection_env must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Checks one pipeline, then its dependency graph.
pub fn validate_pipeline(cfg: &RawConfigFile, name: &str, pipeline: &PipelineConfig) -> Result<()> {
    if pipeline.task.is_empty() {
        return Err(LoadgateError::ConfigError(format!(
            "pipeline '{name}' must contain at least one [pipeline.{name}.task.<id>] section"
        )));
    }
    if pipeline.max_workers == Some(0) {
        return Err(LoadgateError::ConfigError(format!(
            "[pipeline.{name}].max_workers must be >= 1 (got 0)"
        )));
    }
    if let Some(schedule) = &pipeline.schedule {
        schedule.parse::<Cadence>().map_err(|e| {
            LoadgateError::ConfigError(format!("[pipeline.{name}].schedule: {e}"))
        })?;
    }

    validate_tasks(cfg, name, pipeline)?;
    validate_task_dependencies(pipeline)?;
    validate_dag(pipeline)?;
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile, pipeline_name: &str, pipeline: &PipelineConfig) -> Result<()> {
    for (id, task) in pipeline.task.iter() {
        let section = format!("[pipeline.{pipeline_name}.task.{id}]");
        let invalid = |reason: String| LoadgateError::ConfigError(format!("{section}: {reason}"));

        cfg.defaults
            .retry_policy_for(task)
            .map_err(|e| invalid(format!("retry_delay: {e}")))?;

        match &task.kind {
            TaskKindConfig::Noop => {}
            TaskKindConfig::Stage {
                table, bucket, key, ..
            } => {
                require_non_empty(table, "table").map_err(invalid)?;
                require_non_empty(bucket, "bucket").map_err(invalid)?;
                // Unknown placeholders are caught here rather than on every run.
                S3Location::new(bucket.clone(), key.clone())
                    .render_key(Utc::now())
                    .map_err(|e| invalid(format!("key: {e}")))?;
            }
            TaskKindConfig::Load { table, query, .. } => {
                require_non_empty(table, "table").map_err(invalid)?;
                require_non_empty(query, "query").map_err(invalid)?;
            }
            TaskKindConfig::Quality { tables } => {
                if tables.is_empty() {
                    return Err(invalid("`tables` must list at least one table".to_string()));
                }
                if tables.iter().any(|t| t.trim().is_empty()) {
                    return Err(invalid("`tables` must not contain empty names".to_string()));
                }
            }
        }
    }
    Ok(())
}

fn require_non_empty(value: &str, field: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("`{field}` must not be empty"))
    } else {
        Ok(())
    }
}

fn validate_task_dependencies(pipeline: &PipelineConfig) -> Result<()> {
    for (name, task) in pipeline.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(GraphError::Cycle {
                    task: name.clone(),
                    detail: "task lists itself in `after`".to_string(),
                }
                .into());
            }
            if !pipeline.task.contains_key(dep) {
                return Err(GraphError::UnknownPredecessor {
                    task: name.clone(),
                    predecessor: dep.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn validate_dag(pipeline: &PipelineConfig) -> Result<()> {
    // Edge direction: dep -> task
    // For:
    //   [pipeline.p.task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in pipeline.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in pipeline.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(GraphError::Cycle {
            task: cycle.node_id().to_string(),
            detail: "tasks depend on each other through `after`".to_string(),
        }
        .into()),
    }
}
