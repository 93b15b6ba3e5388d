// src/engine/retry.rs

//! Per-task retry policy.

use std::time::Duration;

use serde::Serialize;

use crate::types::{FailureKind, RetryScope};

/// Additional attempts after the first one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Fixed wait between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Fixed-budget, fixed-delay retry policy.
///
/// With the default scope every failure kind is retried the same way; with
/// [`RetryScope::Transient`] only warehouse/storage failures are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    max_retries: u32,
    #[serde(with = "duration_ms")]
    delay: Duration,
    scope: RetryScope,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
            scope: RetryScope::Any,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            scope: RetryScope::Any,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn with_scope(mut self, scope: RetryScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts the policy allows, first one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn scope(&self) -> RetryScope {
        self.scope
    }

    /// Decide what happens after attempt number `attempt` (1-based) failed
    /// with `kind`.
    pub fn decide(&self, attempt: u32, kind: FailureKind) -> RetryDecision {
        if self.scope == RetryScope::Transient && !kind.is_transient() {
            return RetryDecision::GiveUp;
        }

        if attempt < self.max_attempts() {
            RetryDecision::Retry { delay: self.delay }
        } else {
            RetryDecision::GiveUp
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
