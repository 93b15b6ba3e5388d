// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dag::{DependencyGraph, ScheduledTask, TaskState};
use crate::engine::report::{RunOutcome, RunReport, TaskOutcome, TaskResult};
use crate::engine::retry::RetryDecision;
use crate::engine::{RunnerOptions, TaskId};
use crate::exec::TaskContext;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these tasks to workers.
    DispatchTasks(Vec<ScheduledTask>),
    /// Emit `RetryDue` for `task` once `delay` has elapsed.
    ScheduleRetry { task: TaskId, delay: Duration },
    /// The graph is complete; the report is final.
    Finish(RunOutcome),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer loop should keep waiting for events.
    pub keep_running: bool,
}

impl CoreStep {
    /// Tasks dispatched in this step, across all `DispatchTasks` commands.
    pub fn dispatched(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.commands.iter().flat_map(|c| match c {
            CoreCommand::DispatchTasks(tasks) => tasks.as_slice(),
            _ => &[],
        })
    }
}

/// Worker-pool bookkeeping shared by the handlers.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    pub options: RunnerOptions,
    pub run_id: String,
    pub in_flight: usize,
    pub cancelled: bool,
}

impl Dispatcher {
    /// Move as many `Ready` tasks to `Running` as the pool has room for.
    pub fn dispatch_ready(&mut self, graph: &mut DependencyGraph) -> Vec<ScheduledTask> {
        if self.cancelled {
            return Vec::new();
        }

        let capacity = self.options.max_workers.saturating_sub(self.in_flight);
        let mut scheduled = Vec::new();

        for task in graph.ready_tasks().into_iter().take(capacity) {
            let attempt = match graph.mark_running(&task) {
                Ok(attempt) => attempt,
                Err(e) => {
                    error!(task = %task, error = %e, "could not mark ready task as running");
                    continue;
                }
            };
            let Some(spec) = graph.spec(&task) else {
                continue;
            };

            let context = TaskContext {
                run_id: self.run_id.clone(),
                pipeline: self.options.pipeline.clone(),
                task: task.clone(),
                attempt,
                logical_ts: self.options.logical_ts,
                target_table: spec.target_table().map(str::to_string),
                load_mode: spec.load_mode(),
            };

            if attempt > 1 {
                info!(task = %task, attempt, run_id = %self.run_id, "dispatching retry");
            } else {
                info!(task = %task, run_id = %self.run_id, "dispatching task");
            }

            scheduled.push(ScheduledTask {
                task,
                attempt,
                executor: spec.executor().clone(),
                context,
            });
            self.in_flight += 1;
        }

        scheduled
    }
}

/// Dispatch the initial wavefront (graph roots).
pub(crate) fn handle_start(
    graph: &mut DependencyGraph,
    report: &mut RunReport,
    dispatcher: &mut Dispatcher,
) -> CoreStep {
    let mut commands = Vec::new();
    push_dispatch(&mut commands, dispatcher.dispatch_ready(graph));
    finish_if_complete(graph, report, dispatcher, commands)
}

/// Handle a worker reporting one attempt.
pub(crate) fn handle_task_finished(
    graph: &mut DependencyGraph,
    report: &mut RunReport,
    dispatcher: &mut Dispatcher,
    result: TaskResult,
) -> CoreStep {
    let mut commands = Vec::new();
    let task = result.task.clone();

    if graph.state_of(&task) != Some(TaskState::Running) {
        warn!(
            task = %task,
            state = ?graph.state_of(&task),
            "completion for task that is not running; ignoring"
        );
        return finish_if_complete(graph, report, dispatcher, commands);
    }

    dispatcher.in_flight = dispatcher.in_flight.saturating_sub(1);
    report.record(result.clone());

    match &result.outcome {
        TaskOutcome::Success => {
            if let Err(e) = graph.mark_result(&task, &result) {
                error!(task = %task, error = %e, "failed to record task success");
            }
        }
        TaskOutcome::Failed { kind, message } => {
            let decision = match graph.spec(&task) {
                Some(spec) if !dispatcher.cancelled => spec.retry().decide(result.attempt, *kind),
                _ => RetryDecision::GiveUp,
            };

            match decision {
                RetryDecision::Retry { delay } => {
                    info!(
                        task = %task,
                        attempt = result.attempt,
                        kind = %kind,
                        error = %message,
                        retry_in_secs = delay.as_secs(),
                        "task attempt failed; will retry"
                    );
                    match graph.mark_retry(&task, &result) {
                        Ok(()) => commands.push(CoreCommand::ScheduleRetry {
                            task: task.clone(),
                            delay,
                        }),
                        Err(e) => {
                            error!(task = %task, error = %e, "failed to hold task for retry");
                        }
                    }
                }
                RetryDecision::GiveUp => {
                    match graph.mark_result(&task, &result) {
                        Ok(step) if !step.newly_skipped.is_empty() => {
                            warn!(
                                task = %task,
                                skipped = ?step.newly_skipped,
                                "retries exhausted; downstream tasks skipped"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!(task = %task, error = %e, "failed to record task failure");
                        }
                    }
                }
            }
        }
    }

    push_dispatch(&mut commands, dispatcher.dispatch_ready(graph));
    finish_if_complete(graph, report, dispatcher, commands)
}

/// Handle a retry backoff expiring.
pub(crate) fn handle_retry_due(
    graph: &mut DependencyGraph,
    report: &mut RunReport,
    dispatcher: &mut Dispatcher,
    task: TaskId,
) -> CoreStep {
    let mut commands = Vec::new();

    match graph.release_retry(&task) {
        Ok(true) => debug!(task = %task, "retry backoff elapsed; task Ready"),
        Ok(false) => debug!(task = %task, "retry backoff elapsed but task no longer waiting"),
        Err(e) => warn!(task = %task, error = %e, "retry timer for unknown task"),
    }

    push_dispatch(&mut commands, dispatcher.dispatch_ready(graph));
    finish_if_complete(graph, report, dispatcher, commands)
}

/// Stop dispatching; everything not yet running is skipped.
pub(crate) fn handle_cancel(
    graph: &mut DependencyGraph,
    report: &mut RunReport,
    dispatcher: &mut Dispatcher,
) -> CoreStep {
    if !dispatcher.cancelled {
        info!(
            run_id = %dispatcher.run_id,
            in_flight = dispatcher.in_flight,
            "cancellation requested; letting running tasks finish"
        );
        dispatcher.cancelled = true;
        graph.cancel_remaining();
    }
    finish_if_complete(graph, report, dispatcher, Vec::new())
}

fn push_dispatch(commands: &mut Vec<CoreCommand>, tasks: Vec<ScheduledTask>) {
    if !tasks.is_empty() {
        commands.push(CoreCommand::DispatchTasks(tasks));
    }
}

fn finish_if_complete(
    graph: &DependencyGraph,
    report: &mut RunReport,
    dispatcher: &Dispatcher,
    mut commands: Vec<CoreCommand>,
) -> CoreStep {
    if !graph.is_complete() {
        return CoreStep {
            commands,
            keep_running: true,
        };
    }

    let outcome = report.finalize(graph, dispatcher.cancelled);
    info!(run_id = %dispatcher.run_id, %outcome, "run finished");
    commands.push(CoreCommand::Finish(outcome));

    CoreStep {
        commands,
        keep_running: false,
    }
}
