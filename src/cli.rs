// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `loadgate`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "loadgate",
    version,
    about = "Run warehouse load pipelines as dependency graphs with retries and quality gates.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `LOADGATE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a pipeline once for a logical timestamp.
    Run(RunArgs),
    /// Parse and validate the config, print each pipeline's task order.
    Validate(ValidateArgs),
    /// Run a pipeline on its configured cadence until interrupted.
    Schedule(ScheduleArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Pipeline to run.
    #[arg(long, value_name = "NAME")]
    pub pipeline: String,

    /// Logical timestamp of the run: RFC 3339, `YYYY-MM-DDTHH:MM:SS` (UTC)
    /// or `YYYY-MM-DD`. Defaults to the start of the current hour.
    #[arg(long, value_name = "TS", value_parser = parse_logical_date)]
    pub logical_date: Option<DateTime<Utc>>,

    /// Override the pipeline's worker pool size.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_workers: Option<u16>,

    /// Write the final run report as JSON to this path.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct ValidateArgs {
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Only validate this pipeline.
    #[arg(long, value_name = "NAME")]
    pub pipeline: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ScheduleArgs {
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    #[arg(long, value_name = "NAME")]
    pub pipeline: String,

    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_workers: Option<u16>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

/// Parse a `--logical-date` value.
pub fn parse_logical_date(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }
    Err(format!(
        "invalid logical date '{s}'; expected RFC 3339, YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD"
    ))
}

/// Start of the hour containing `now`.
pub fn current_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_nanosecond(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_minute(0))
        .unwrap_or(now)
}
