use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use loadgate::engine::Diagnostics;
use loadgate::exec::{Executor, ExecutorError, ExecutorKind, TaskContext};
use loadgate::types::FailureKind;
use loadgate::warehouse::WarehouseError;

/// One call to a [`ScriptedExecutor`].
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub task: String,
    pub attempt: u32,
    pub started: Instant,
    pub finished: Instant,
}

/// Shared, ordered record of every scripted dispatch in a run.
#[derive(Debug, Clone, Default)]
pub struct DispatchLog {
    inner: Arc<Mutex<Vec<Dispatch>>>,
    running: Arc<Mutex<(usize, usize)>>,
}

impl DispatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Dispatch> {
        self.inner.lock().unwrap().clone()
    }

    pub fn tasks(&self) -> Vec<String> {
        self.records().into_iter().map(|d| d.task).collect()
    }

    pub fn dispatches_of(&self, task: &str) -> Vec<Dispatch> {
        self.records().into_iter().filter(|d| d.task == task).collect()
    }

    /// Highest number of executors observed running at once.
    pub fn max_concurrency(&self) -> usize {
        self.running.lock().unwrap().1
    }

    fn enter(&self) {
        let mut guard = self.running.lock().unwrap();
        guard.0 += 1;
        guard.1 = guard.1.max(guard.0);
    }

    fn exit(&self, dispatch: Dispatch) {
        self.running.lock().unwrap().0 -= 1;
        self.inner.lock().unwrap().push(dispatch);
    }
}

/// What a [`ScriptedExecutor`] does when called.
#[derive(Debug, Clone)]
pub enum Script {
    Succeed,
    /// Fail the first `n` attempts with `kind`, then succeed.
    FailTimes(u32, FailureKind),
    AlwaysFail(FailureKind),
    Panic,
}

/// Executor whose behaviour is decided by the test.
#[derive(Debug)]
pub struct ScriptedExecutor {
    script: Script,
    work: Duration,
    log: DispatchLog,
}

impl ScriptedExecutor {
    pub fn new(script: Script, log: &DispatchLog) -> Self {
        Self {
            script,
            work: Duration::ZERO,
            log: log.clone(),
        }
    }

    pub fn succeed(log: &DispatchLog) -> Arc<dyn Executor> {
        Arc::new(Self::new(Script::Succeed, log))
    }

    pub fn failing(kind: FailureKind, log: &DispatchLog) -> Arc<dyn Executor> {
        Arc::new(Self::new(Script::AlwaysFail(kind), log))
    }

    /// Simulated time each call spends "working".
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Custom("scripted")
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<Diagnostics, ExecutorError> {
        let started = Instant::now();
        self.log.enter();
        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }
        self.log.exit(Dispatch {
            task: ctx.task.clone(),
            attempt: ctx.attempt,
            started,
            finished: Instant::now(),
        });

        match &self.script {
            Script::Succeed => Ok(Diagnostics::default()),
            Script::FailTimes(n, kind) if ctx.attempt <= *n => Err(error_of_kind(*kind, ctx)),
            Script::FailTimes(..) => Ok(Diagnostics::default()),
            Script::AlwaysFail(kind) => Err(error_of_kind(*kind, ctx)),
            Script::Panic => panic!("scripted panic in {}", ctx.task),
        }
    }
}

/// An [`ExecutorError`] that classifies as `kind`.
///
/// Panics for [`FailureKind::Internal`]; call it from inside `execute`.
pub fn error_of_kind(kind: FailureKind, ctx: &TaskContext) -> ExecutorError {
    let msg = format!("scripted failure of {} attempt {}", ctx.task, ctx.attempt);
    match kind {
        FailureKind::Warehouse => ExecutorError::Warehouse(WarehouseError::Statement(msg)),
        FailureKind::Storage => ExecutorError::Storage(msg),
        FailureKind::SourceData => ExecutorError::SourceData(msg),
        FailureKind::QualityViolation => ExecutorError::QualityViolation {
            table: ctx.target_table.clone().unwrap_or_else(|| "songs".to_string()),
            reason: msg,
        },
        FailureKind::MissingParameter => ExecutorError::MissingParameter(msg),
        FailureKind::Credentials => ExecutorError::Credentials(
            loadgate::storage::CredentialError::MissingVar("AWS_ACCESS_KEY_ID".to_string()),
        ),
        FailureKind::Template => ExecutorError::Template(
            loadgate::storage::TemplateError::UnknownPlaceholder("bogus".to_string(), msg),
        ),
        // Only a panic classifies as Internal.
        FailureKind::Internal => panic!("{msg}"),
    }
}
