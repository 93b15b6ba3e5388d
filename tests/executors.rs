// tests/executors.rs

mod common;
use crate::common::{TestResult, init_tracing, logical_ts, with_timeout};

use std::sync::Arc;

use loadgate::exec::{
    Executor, ExecutorError, LoadExecutor, NoopExecutor, QualityExecutor, StageExecutor,
    TaskContext,
};
use loadgate::storage::{
    CredentialError, CredentialProvider, Credentials, EnvCredentials, S3Location,
    StaticCredentials,
};
use loadgate::types::{FailureKind, LoadMode};
use loadgate::warehouse::Statement;
use loadgate_test_utils::MemoryWarehouse;
use loadgate_test_utils::memory_warehouse::rows;

const SONGS_QUERY: &str = "SELECT DISTINCT song_id, title FROM staging_songs";

fn ctx(task: &str, table: Option<&str>, mode: LoadMode) -> TaskContext {
    TaskContext {
        run_id: "scheduled__sparkify__2018-11-01T13:00:00Z".to_string(),
        pipeline: "sparkify".to_string(),
        task: task.to_string(),
        attempt: 1,
        logical_ts: logical_ts(),
        target_table: table.map(str::to_string),
        load_mode: mode,
    }
}

fn test_credentials() -> Arc<dyn CredentialProvider> {
    Arc::new(StaticCredentials(Credentials::new("AKIATEST", "s3cr3t")))
}

#[tokio::test]
async fn noop_always_succeeds() -> TestResult {
    let diagnostics = NoopExecutor
        .execute(&ctx("begin", None, LoadMode::Append))
        .await?;
    assert!(diagnostics.row_counts.is_empty());
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stage_replaces_table_with_copied_records() -> TestResult {
    init_tracing();
    let warehouse = MemoryWarehouse::new()
        .with_table("staging_events", rows(3))
        .with_source("s3://udacity-dend/log_data/2018/11", rows(7));
    let location = S3Location::new("s3://udacity-dend", "log_data/{year}/{month}")
        .with_json_path("s3://udacity-dend/log_json_path.json");
    let stage = StageExecutor::new(location, test_credentials(), warehouse.connector());

    let context = ctx("stage_events", Some("staging_events"), LoadMode::Append);
    let diagnostics = with_timeout(stage.execute(&context)).await?;

    assert_eq!(warehouse.row_count("staging_events"), 7);
    assert_eq!(diagnostics.row_counts.get("staging_events"), Some(&7));

    // A second attempt starts from scratch.
    with_timeout(stage.execute(&context)).await?;
    assert_eq!(warehouse.row_count("staging_events"), 7);

    let statements = warehouse.statements();
    let copy = statements
        .iter()
        .find_map(|r| match &r.statement {
            c @ Statement::CopyJson { .. } => Some(c.clone()),
            _ => None,
        })
        .expect("copy issued");
    let Statement::CopyJson {
        source,
        access_key,
        json_path,
        region,
        ..
    } = &copy
    else {
        unreachable!()
    };
    assert_eq!(source, "s3://udacity-dend/log_data/2018/11");
    assert_eq!(access_key, "AKIATEST");
    assert_eq!(json_path, "s3://udacity-dend/log_json_path.json");
    assert_eq!(region, "us-west-2");

    // Logs never see the secret.
    assert!(!copy.redacted().contains("s3cr3t"));
    assert!(!format!("{copy:?}").contains("s3cr3t"));
    Ok(())
}

#[tokio::test]
async fn stage_missing_source_is_a_storage_failure() -> TestResult {
    let warehouse = MemoryWarehouse::new();
    let stage = StageExecutor::new(
        S3Location::new("udacity-dend", "song_data"),
        test_credentials(),
        warehouse.connector(),
    );

    let err = stage
        .execute(&ctx("stage_songs", Some("staging_songs"), LoadMode::Append))
        .await
        .expect_err("no such source");
    assert_eq!(err.kind(), FailureKind::Storage);
    assert!(err.kind().is_transient());
    assert!(err.to_string().contains("s3://udacity-dend/song_data"), "{err}");
    Ok(())
}

#[tokio::test]
async fn stage_without_credentials_fails_before_connecting() -> TestResult {
    let warehouse = MemoryWarehouse::new();
    let credentials: Arc<dyn CredentialProvider> = Arc::new(EnvCredentials::new(
        "LOADGATE_TEST_NEVER_SET_ACCESS_KEY",
        "LOADGATE_TEST_NEVER_SET_SECRET_KEY",
    ));
    let stage = StageExecutor::new(
        S3Location::new("udacity-dend", "song_data"),
        credentials,
        warehouse.connector(),
    );

    let err = stage
        .execute(&ctx("stage_songs", Some("staging_songs"), LoadMode::Append))
        .await
        .expect_err("credentials are missing");
    assert_eq!(
        err,
        ExecutorError::Credentials(CredentialError::MissingVar(
            "LOADGATE_TEST_NEVER_SET_ACCESS_KEY".to_string()
        ))
    );
    assert_eq!(err.kind(), FailureKind::Credentials);
    assert_eq!(warehouse.connect_count(), 0);
    Ok(())
}

#[tokio::test]
async fn stage_with_unknown_placeholder_is_a_template_failure() -> TestResult {
    let warehouse = MemoryWarehouse::new();
    let stage = StageExecutor::new(
        S3Location::new("udacity-dend", "log_data/{week}"),
        test_credentials(),
        warehouse.connector(),
    );

    let err = stage
        .execute(&ctx("stage_events", Some("staging_events"), LoadMode::Append))
        .await
        .expect_err("unknown placeholder");
    assert_eq!(err.kind(), FailureKind::Template);
    Ok(())
}

#[tokio::test]
async fn stage_without_target_table_is_missing_parameter() -> TestResult {
    let warehouse = MemoryWarehouse::new();
    let stage = StageExecutor::new(
        S3Location::new("udacity-dend", "song_data"),
        test_credentials(),
        warehouse.connector(),
    );
    assert!(stage.requires_target_table());

    let err = stage
        .execute(&ctx("stage_songs", None, LoadMode::Append))
        .await
        .expect_err("no table");
    assert_eq!(err.kind(), FailureKind::MissingParameter);
    Ok(())
}

#[tokio::test]
async fn connection_failure_is_a_warehouse_failure() -> TestResult {
    let warehouse = MemoryWarehouse::new().with_source(SONGS_QUERY, rows(2));
    warehouse.fail_next_connects(1);
    let load = LoadExecutor::new(SONGS_QUERY, warehouse.connector());
    let context = ctx("load_song_dim", Some("songs"), LoadMode::Append);

    let err = load.execute(&context).await.expect_err("refused");
    assert_eq!(err.kind(), FailureKind::Warehouse);

    // The next attempt connects afresh.
    load.execute(&context).await?;
    assert_eq!(warehouse.connect_count(), 2);
    assert_eq!(warehouse.row_count("songs"), 2);
    Ok(())
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

#[tokio::test]
async fn append_load_duplicates_rows_on_rerun() -> TestResult {
    let warehouse = MemoryWarehouse::new().with_source(SONGS_QUERY, rows(4));
    let load = LoadExecutor::new(SONGS_QUERY, warehouse.connector());
    let context = ctx("load_song_dim", Some("songs"), LoadMode::Append);

    load.execute(&context).await?;
    let diagnostics = load.execute(&context).await?;

    assert_eq!(warehouse.row_count("songs"), 8);
    assert_eq!(diagnostics.row_counts.get("songs"), Some(&8));
    assert!(
        !warehouse
            .statements()
            .iter()
            .any(|r| matches!(r.statement, Statement::DeleteAll { .. }))
    );
    Ok(())
}

#[tokio::test]
async fn replace_load_is_idempotent() -> TestResult {
    let warehouse = MemoryWarehouse::new()
        .with_table("songs", rows(10))
        .with_source(SONGS_QUERY, rows(4));
    let load = LoadExecutor::new(SONGS_QUERY, warehouse.connector());
    let context = ctx("load_song_dim", Some("songs"), LoadMode::Replace);

    load.execute(&context).await?;
    load.execute(&context).await?;

    assert_eq!(warehouse.row_count("songs"), 4);

    let kinds: Vec<&'static str> = warehouse
        .statements()
        .iter()
        .map(|r| match r.statement {
            Statement::DeleteAll { .. } => "delete",
            Statement::InsertSelect { .. } => "insert",
            Statement::CountRows { .. } => "count",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["delete", "insert", "count", "delete", "insert", "count"]
    );
    Ok(())
}

#[tokio::test]
async fn load_with_blank_query_is_missing_parameter() -> TestResult {
    let warehouse = MemoryWarehouse::new();
    let load = LoadExecutor::new("   ", warehouse.connector());

    let err = load
        .execute(&ctx("load_song_dim", Some("songs"), LoadMode::Append))
        .await
        .expect_err("blank query");
    assert_eq!(err.kind(), FailureKind::MissingParameter);
    assert_eq!(warehouse.connect_count(), 0);
    Ok(())
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quality_passes_when_every_table_has_rows() -> TestResult {
    let warehouse = MemoryWarehouse::new()
        .with_table("songs", rows(2))
        .with_table("users", rows(5));
    let quality = QualityExecutor::new(["songs", "users"], warehouse.connector());

    let diagnostics = quality
        .execute(&ctx("quality_gate", None, LoadMode::Append))
        .await?;

    assert_eq!(diagnostics.row_counts.get("songs"), Some(&2));
    assert_eq!(diagnostics.row_counts.get("users"), Some(&5));
    Ok(())
}

#[tokio::test]
async fn quality_fails_on_empty_table() -> TestResult {
    let warehouse = MemoryWarehouse::new()
        .with_table("songs", rows(2))
        .with_table("users", Vec::new());
    let quality = QualityExecutor::new(["songs", "users"], warehouse.connector());

    let err = quality
        .execute(&ctx("quality_gate", None, LoadMode::Append))
        .await
        .expect_err("users is empty");

    assert_eq!(err.kind(), FailureKind::QualityViolation);
    let ExecutorError::QualityViolation { table, reason } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(table, "users");
    assert!(reason.contains("zero rows"), "{reason}");
    Ok(())
}

#[tokio::test]
async fn quality_fails_on_unreachable_table() -> TestResult {
    let warehouse = MemoryWarehouse::new()
        .with_table("songs", rows(2))
        .with_table("artists", rows(2));
    warehouse.make_unreachable("songs");
    let quality = QualityExecutor::new(["songs", "artists"], warehouse.connector());

    let err = quality
        .execute(&ctx("quality_gate", None, LoadMode::Append))
        .await
        .expect_err("songs unreachable");
    assert!(
        matches!(&err, ExecutorError::QualityViolation { table, reason }
            if table == "songs" && reason.starts_with("table unreachable")),
        "{err:?}"
    );

    // Checks stop at the first violation.
    assert!(warehouse.counts_of("artists").is_empty());

    warehouse.make_reachable("songs");
    quality
        .execute(&ctx("quality_gate", None, LoadMode::Append))
        .await?;
    Ok(())
}

#[tokio::test]
async fn quality_fails_on_missing_table() -> TestResult {
    let warehouse = MemoryWarehouse::new();
    let quality = QualityExecutor::new(["time"], warehouse.connector());

    let err = quality
        .execute(&ctx("quality_gate", None, LoadMode::Append))
        .await
        .expect_err("time does not exist");
    assert_eq!(err.kind(), FailureKind::QualityViolation);
    Ok(())
}

#[tokio::test]
async fn quality_without_tables_is_missing_parameter() -> TestResult {
    let warehouse = MemoryWarehouse::new();
    let quality = QualityExecutor::new(Vec::<String>::new(), warehouse.connector());

    let err = quality
        .execute(&ctx("quality_gate", None, LoadMode::Append))
        .await
        .expect_err("nothing to check");
    assert_eq!(err.kind(), FailureKind::MissingParameter);
    Ok(())
}
