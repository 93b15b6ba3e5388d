// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipeline;
pub mod schedule;
pub mod storage;
pub mod types;
pub mod warehouse;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::{CliArgs, Command, RunArgs, ScheduleArgs, ValidateArgs};
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{RunReport, Runner};
use crate::errors::{LoadgateError, Result};
use crate::pipeline::PipelineDefinition;
use crate::storage::{CredentialProvider, EnvCredentials};
use crate::warehouse::{PostgresConnector, WarehouseConnector};

/// Every task succeeded.
pub const EXIT_SUCCESS: i32 = 0;
/// A task failed (or was skipped), or loadgate itself hit an internal error.
pub const EXIT_FAILURE: i32 = 1;
/// Invalid configuration; nothing was scheduled.
pub const EXIT_CONFIGURATION: i32 = 2;
/// The run was interrupted.
pub const EXIT_CANCELLED: i32 = 3;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and validation
/// - warehouse and credential capabilities
/// - the runner (once, or on a schedule)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Run(run_args) => run_once(run_args).await,
        Command::Validate(validate_args) => validate(validate_args),
        Command::Schedule(schedule_args) => run_scheduled(schedule_args).await,
    }
}

async fn run_once(args: RunArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)?;
    let definition = build_pipeline(&cfg, &args.pipeline, args.max_workers)?;

    let logical_ts = args
        .logical_date
        .unwrap_or_else(|| cli::current_hour(Utc::now()));

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let runner = Runner::new(definition.runner_options(logical_ts)).with_cancellation(cancel);
    let report = runner.run(definition.new_run_graph()).await;

    print_summary(&report);
    if let Some(path) = &args.report {
        // The run already finished; its outcome decides the exit code.
        if let Err(e) = write_report(&report, path) {
            error!(path = %path.display(), error = %e, "failed to write run report");
        }
    }

    Ok(exit_code_for(&report))
}

fn validate(args: ValidateArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)?;

    let names: Vec<String> = match &args.pipeline {
        Some(name) => {
            if !cfg.pipeline.contains_key(name) {
                return Err(LoadgateError::PipelineNotFound(name.clone()));
            }
            vec![name.clone()]
        }
        None => cfg.pipeline_names().map(str::to_string).collect(),
    };

    // Graphs are built but never run, so the connector is never used.
    let connector: Arc<dyn WarehouseConnector> = Arc::new(PostgresConnector::new(String::new()));
    let credentials = credentials_from(&cfg);

    println!("config {} is valid", args.config.display());
    for name in names {
        let definition =
            PipelineDefinition::from_config(&cfg, &name, connector.clone(), credentials.clone())?;
        let schedule = definition
            .schedule()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unscheduled".to_string());
        println!();
        println!(
            "pipeline {name} ({schedule}, max_workers = {}):",
            definition.max_workers()
        );
        let graph = definition.graph();
        for task in graph.topological_order() {
            let kind = graph
                .spec(&task)
                .map(|s| s.executor().kind().to_string())
                .unwrap_or_default();
            let after = graph.predecessors_of(&task);
            if after.is_empty() {
                println!("  - {task} [{kind}]");
            } else {
                println!("  - {task} [{kind}] after {}", after.join(", "));
            }
        }
    }

    Ok(EXIT_SUCCESS)
}

async fn run_scheduled(args: ScheduleArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)?;
    let definition = build_pipeline(&cfg, &args.pipeline, args.max_workers)?;

    let cadence = definition.schedule().ok_or_else(|| {
        LoadgateError::ConfigError(format!(
            "pipeline '{}' has no `schedule`; set [pipeline.{}].schedule",
            args.pipeline, args.pipeline
        ))
    })?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    info!(pipeline = %definition.name(), %cadence, "scheduling pipeline");

    let definition = &definition;
    let token = &cancel;
    let runs = schedule::run_on_schedule(cadence, cancel.clone(), |logical_ts| async move {
        let runner = Runner::new(definition.runner_options(logical_ts))
            .with_cancellation(token.child_token());
        let report = runner.run(definition.new_run_graph()).await;
        print_summary(&report);
    })
    .await;

    info!(runs, "scheduler exited");
    Ok(EXIT_CANCELLED)
}

/// Build a runnable pipeline: resolves the warehouse connection from the
/// environment, so a missing variable is a configuration error.
fn build_pipeline(
    cfg: &ConfigFile,
    name: &str,
    max_workers: Option<u16>,
) -> Result<PipelineDefinition> {
    if !cfg.pipeline.contains_key(name) {
        return Err(LoadgateError::PipelineNotFound(name.to_string()));
    }

    let var = &cfg.warehouse.connection_env;
    let conn_str = std::env::var(var).map_err(|_| {
        LoadgateError::ConfigError(format!(
            "warehouse connection variable {var} is not set"
        ))
    })?;
    let connector: Arc<dyn WarehouseConnector> = Arc::new(PostgresConnector::new(conn_str));

    let mut definition =
        PipelineDefinition::from_config(cfg, name, connector, credentials_from(cfg))?;
    if let Some(n) = max_workers {
        definition = definition.with_max_workers(usize::from(n));
    }
    Ok(definition)
}

fn credentials_from(cfg: &ConfigFile) -> Arc<dyn CredentialProvider> {
    Arc::new(EnvCredentials::new(
        cfg.credentials.access_key_env.clone(),
        cfg.credentials.secret_key_env.clone(),
    ))
}

/// Ctrl-C → stop dispatching, let running tasks finish.
fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        warn!("interrupt received; cancelling run");
        cancel.cancel();
    });
}

/// Exit code for a finalized report.
pub fn exit_code_for(report: &RunReport) -> i32 {
    report
        .outcome
        .map(|outcome| outcome.exit_code())
        .unwrap_or(EXIT_FAILURE)
}

fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| LoadgateError::Other(anyhow::anyhow!("serializing run report: {e}")))?;
    fs::write(path, json)?;
    info!(path = %path.display(), "run report written");
    Ok(())
}

/// Print every task's final state to stdout.
fn print_summary(report: &RunReport) {
    let outcome = report
        .outcome
        .map(|o| o.to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    println!("{} {}", report.run_id, outcome);

    for task in &report.tasks {
        print!("  {:<24} {:<9} attempts={}", task.task, task.state, task.attempts);
        if let Some(reason) = &task.skip_reason {
            print!(" ({reason})");
        }
        if let Some(failure) = &task.last_failure {
            print!(" [{}] {}", failure.kind, failure.message);
        }
        println!();
    }
}
