#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

pub use loadgate_test_utils::builders;
pub use loadgate_test_utils::{init_tracing, with_timeout, with_timeout_of};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// 2018-11-01T13:00:00Z, the logical timestamp most tests run at.
pub fn logical_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 11, 1, 13, 0, 0).unwrap()
}
