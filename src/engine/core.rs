// src/engine/core.rs

//! Pure core scheduler state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RunnerEvent`]s and produces:
//! - an updated graph/report state
//! - a list of [`CoreCommand`]s describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runner`) is responsible for:
//! - reading events from channels
//! - running executors on worker tasks
//! - sleeping through retry backoffs
//! - turning external cancellation into an event
//!
//! The core is the single writer of graph state, and can be unit tested
//! without Tokio, channels or executors.

use crate::dag::DependencyGraph;
use crate::engine::event_handlers::{
    CoreStep, Dispatcher, handle_cancel, handle_retry_due, handle_start, handle_task_finished,
};
use crate::engine::report::RunReport;
use crate::engine::{RunnerEvent, RunnerOptions};

/// Pure core runtime state.
///
/// This owns:
/// - the run's dependency graph
/// - the run report
/// - worker pool bookkeeping
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    graph: DependencyGraph,
    report: RunReport,
    dispatcher: Dispatcher,
    finished: bool,
}

impl CoreRuntime {
    pub fn new(graph: DependencyGraph, mut options: RunnerOptions) -> Self {
        // A pool of zero would never dispatch and never finish.
        options.max_workers = options.max_workers.max(1);
        let report = RunReport::start(options.pipeline.clone(), options.logical_ts);
        let dispatcher = Dispatcher {
            run_id: report.run_id.clone(),
            options,
            in_flight: 0,
            cancelled: false,
        };
        Self {
            graph,
            report,
            dispatcher,
            finished: false,
        }
    }

    /// Dispatch the first wavefront. Call once, before any event.
    pub fn start(&mut self) -> CoreStep {
        let step = handle_start(&mut self.graph, &mut self.report, &mut self.dispatcher);
        self.finished = !step.keep_running;
        step
    }

    /// Handle a single event, returning the resulting commands.
    pub fn step(&mut self, event: RunnerEvent) -> CoreStep {
        if self.finished {
            return CoreStep {
                commands: Vec::new(),
                keep_running: false,
            };
        }

        let step = match event {
            RunnerEvent::TaskFinished(result) => handle_task_finished(
                &mut self.graph,
                &mut self.report,
                &mut self.dispatcher,
                result,
            ),
            RunnerEvent::RetryDue { task } => {
                handle_retry_due(&mut self.graph, &mut self.report, &mut self.dispatcher, task)
            }
            RunnerEvent::CancelRequested => {
                handle_cancel(&mut self.graph, &mut self.report, &mut self.dispatcher)
            }
        };
        self.finished = !step.keep_running;
        step
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.dispatcher.cancelled
    }

    /// Number of tasks currently handed to workers.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Consume the core, returning the report.
    ///
    /// If the run never reached completion (e.g. the event source went away)
    /// the report is finalized from whatever state the graph is in.
    pub fn into_report(mut self) -> RunReport {
        if self.report.outcome.is_none() {
            self.report.finalize(&self.graph, self.dispatcher.cancelled);
        }
        self.report
    }
}
