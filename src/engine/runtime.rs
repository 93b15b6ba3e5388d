// src/engine/runtime.rs

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::{DependencyGraph, ScheduledTask};
use crate::engine::report::RunReport;
use crate::exec::task_runner::run_task;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RunnerEvent, RunnerOptions};

/// Drives a [`DependencyGraph`] to completion.
///
/// This is the async IO shell around [`CoreRuntime`], which holds all the
/// scheduling semantics. The shell:
/// - runs each dispatched task on its own Tokio task (the core bounds how many
///   are in flight)
/// - sleeps through retry backoffs on timer tasks, so the loop itself never
///   blocks on an individual task
/// - turns the cancellation token into a `CancelRequested` event
#[derive(Debug)]
pub struct Runner {
    options: RunnerOptions,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the graph and return the finalized report.
    ///
    /// Task failures never surface as an `Err`: they are recorded in the
    /// report and reflected in its outcome.
    pub async fn run(self, graph: DependencyGraph) -> RunReport {
        let (event_tx, mut event_rx) = mpsc::channel::<RunnerEvent>(64);
        let max_workers = self.options.max_workers;
        let mut core = CoreRuntime::new(graph, self.options);

        info!(
            run_id = %core.report().run_id,
            tasks = core.graph().len(),
            max_workers,
            "run started"
        );

        let step = core.start();
        let mut keep_running = execute_step(step, &event_tx);
        let mut cancel_seen = false;

        while keep_running {
            let event = tokio::select! {
                maybe = event_rx.recv() => match maybe {
                    Some(event) => event,
                    None => {
                        warn!("runner event channel closed; stopping");
                        break;
                    }
                },
                _ = self.cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    RunnerEvent::CancelRequested
                }
            };

            debug!(?event, "runner received event");

            let step = core.step(event);
            keep_running = execute_step(step, &event_tx);
        }

        core.into_report()
    }
}

/// Execute the commands of one core step; returns `keep_running`.
fn execute_step(step: CoreStep, event_tx: &mpsc::Sender<RunnerEvent>) -> bool {
    for command in step.commands {
        match command {
            CoreCommand::DispatchTasks(tasks) => spawn_workers(tasks, event_tx),
            CoreCommand::ScheduleRetry { task, delay } => {
                let tx = event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    // The run may have ended while we slept.
                    let _ = tx.send(RunnerEvent::RetryDue { task }).await;
                });
            }
            CoreCommand::Finish(outcome) => {
                debug!(%outcome, "core issued Finish command");
            }
        }
    }
    step.keep_running
}

fn spawn_workers(tasks: Vec<ScheduledTask>, event_tx: &mpsc::Sender<RunnerEvent>) {
    for task in tasks {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            let name = task.task.clone();
            let result = run_task(task).await;
            if tx.send(RunnerEvent::TaskFinished(result)).await.is_err() {
                warn!(task = %name, "runner gone before task result could be delivered");
            }
        });
    }
}
