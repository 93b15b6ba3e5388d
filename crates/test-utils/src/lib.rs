pub mod builders;
pub mod memory_warehouse;
pub mod scripted_executor;

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt};

pub use memory_warehouse::{MemoryWarehouse, StatementRecord};
pub use scripted_executor::{Dispatch, DispatchLog, Script, ScriptedExecutor};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
///
/// Under a paused clock the timeout is virtual too, so it only trips when the
/// run is genuinely stuck (nothing left to auto-advance to).
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Like [`with_timeout`] with a caller-chosen budget (retry scenarios wait
/// through minutes of virtual backoff).
pub async fn with_timeout_of<F, T>(limit: std::time::Duration, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(limit, f)
        .await
        .unwrap_or_else(|_| panic!("Test timed out after {limit:?}"))
}
