// tests/retry_policy.rs

use std::time::Duration;

use loadgate::engine::retry::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use loadgate::engine::{RetryDecision, RetryPolicy};
use loadgate::types::{FailureKind, RetryScope};

#[test]
fn default_is_three_retries_five_minutes_apart() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries(), DEFAULT_MAX_RETRIES);
    assert_eq!(policy.max_attempts(), 4);
    assert_eq!(policy.delay(), Duration::from_secs(300));
    assert_eq!(DEFAULT_RETRY_DELAY, Duration::from_secs(300));
    assert_eq!(policy.scope(), RetryScope::Any);
}

#[test]
fn retries_until_budget_is_spent() {
    let policy = RetryPolicy::default();
    let retry = RetryDecision::Retry {
        delay: Duration::from_secs(300),
    };

    for attempt in 1..=3 {
        assert_eq!(policy.decide(attempt, FailureKind::Warehouse), retry);
    }
    assert_eq!(policy.decide(4, FailureKind::Warehouse), RetryDecision::GiveUp);
    assert_eq!(policy.decide(9, FailureKind::Warehouse), RetryDecision::GiveUp);
}

#[test]
fn uniform_scope_retries_every_kind_the_same() {
    let policy = RetryPolicy::new(1, Duration::from_secs(1));
    for kind in [
        FailureKind::QualityViolation,
        FailureKind::SourceData,
        FailureKind::Credentials,
        FailureKind::Internal,
    ] {
        assert_eq!(
            policy.decide(1, kind),
            RetryDecision::Retry {
                delay: Duration::from_secs(1)
            }
        );
    }
}

#[test]
fn transient_scope_gives_up_on_permanent_kinds() {
    let policy = RetryPolicy::default().with_scope(RetryScope::Transient);

    assert!(matches!(
        policy.decide(1, FailureKind::Storage),
        RetryDecision::Retry { .. }
    ));
    assert!(matches!(
        policy.decide(1, FailureKind::Warehouse),
        RetryDecision::Retry { .. }
    ));
    assert_eq!(
        policy.decide(1, FailureKind::Template),
        RetryDecision::GiveUp
    );
    assert_eq!(
        policy.decide(1, FailureKind::QualityViolation),
        RetryDecision::GiveUp
    );
}

#[test]
fn none_never_retries() {
    let policy = RetryPolicy::none();
    assert_eq!(policy.max_attempts(), 1);
    assert_eq!(policy.decide(1, FailureKind::Warehouse), RetryDecision::GiveUp);
}
