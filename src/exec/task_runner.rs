// src/exec/task_runner.rs

//! Individual task attempt runner.

use chrono::Utc;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::report::{Diagnostics, TaskOutcome, TaskResult};
use crate::types::FailureKind;

/// Run one attempt of a scheduled task and describe what happened.
///
/// The executor runs on its own Tokio task so a panic inside it is caught
/// here and reported as an [`FailureKind::Internal`] failure instead of
/// taking the runner down. This never returns an error: every failure is a
/// [`TaskResult`].
pub async fn run_task(task: ScheduledTask) -> TaskResult {
    let ScheduledTask {
        task: name,
        attempt,
        executor,
        context,
    } = task;

    info!(
        task = %name,
        attempt,
        run_id = %context.run_id,
        executor = %executor.kind(),
        "starting task"
    );

    let started_at = Utc::now();
    let clock = Instant::now();

    let joined = tokio::spawn(async move { executor.execute(&context).await }).await;
    let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

    let (outcome, diagnostics) = match joined {
        Ok(Ok(diagnostics)) => {
            info!(task = %name, attempt, duration_ms, "task succeeded");
            (TaskOutcome::Success, diagnostics)
        }
        Ok(Err(err)) => {
            warn!(
                task = %name,
                attempt,
                kind = %err.kind(),
                error = %err,
                "task failed"
            );
            (
                TaskOutcome::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                },
                Diagnostics::default(),
            )
        }
        Err(join_err) => {
            let message = if join_err.is_panic() {
                format!("executor panicked: {}", panic_message(join_err.into_panic()))
            } else {
                format!("executor task was cancelled: {join_err}")
            };
            error!(task = %name, attempt, error = %message, "task execution error");
            (
                TaskOutcome::Failed {
                    kind: FailureKind::Internal,
                    message,
                },
                Diagnostics::default(),
            )
        }
    };

    TaskResult {
        task: name,
        attempt,
        outcome,
        diagnostics,
        started_at,
        duration_ms,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
