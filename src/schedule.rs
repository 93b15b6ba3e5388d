// src/schedule.rs

//! Recurring pipeline triggers.
//!
//! Every tick starts one independent run whose logical timestamp is the
//! start of the interval that just elapsed (a run fired at 14:00 for an
//! hourly cadence covers 13:00-14:00). A run that overruns later ticks does
//! not cause them to be replayed: the loop waits for the next tick after the
//! run finished.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::duration::parse_duration;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// How often a pipeline is triggered. Ticks are aligned to the Unix epoch
/// (so hourly ticks fall on the hour, daily ticks on UTC midnight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Hourly,
    Daily,
    Every(Duration),
}

impl Cadence {
    pub fn period(&self) -> Duration {
        match self {
            Cadence::Hourly => HOUR,
            Cadence::Daily => DAY,
            Cadence::Every(d) => *d,
        }
    }

    /// First tick strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let period = i64::try_from(self.period().as_millis()).ok()?;
        if period <= 0 {
            return None;
        }
        let now_ms = now.timestamp_millis();
        let next = now_ms.div_euclid(period).checked_add(1)?.checked_mul(period)?;
        DateTime::from_timestamp_millis(next)
    }

    /// Logical timestamp of the run fired at `tick`.
    pub fn logical_ts_for(&self, tick: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let period = chrono::TimeDelta::from_std(self.period()).ok()?;
        tick.checked_sub_signed(period)
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match normalized.as_str() {
            "@hourly" | "hourly" | "0 * * * *" => Ok(Cadence::Hourly),
            "@daily" | "daily" | "0 0 * * *" => Ok(Cadence::Daily),
            other => {
                let Some(spec) = other.strip_prefix("every ") else {
                    return Err(format!(
                        "unsupported schedule '{s}'; expected @hourly, @daily, \"0 * * * *\", \"0 0 * * *\" or \"every <duration>\""
                    ));
                };
                let period = parse_duration(spec)?;
                if period.as_millis() == 0 {
                    return Err(format!("schedule '{s}' has a zero period"));
                }
                Ok(Cadence::Every(period))
            }
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Hourly => f.write_str("@hourly"),
            Cadence::Daily => f.write_str("@daily"),
            Cadence::Every(d) => write!(f, "every {}ms", d.as_millis()),
        }
    }
}

/// Call `trigger` with the logical timestamp of each tick until `cancel`
/// fires. Returns the number of runs triggered.
///
/// Runs never overlap: the next tick is computed after `trigger` returns.
pub async fn run_on_schedule<F, Fut>(
    cadence: Cadence,
    cancel: CancellationToken,
    mut trigger: F,
) -> usize
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut runs = 0;
    let mut last_tick: Option<DateTime<Utc>> = None;

    loop {
        let now = Utc::now();
        // Never fire the same tick twice, even if the wall clock lags the timer.
        let from = last_tick.map_or(now, |t| now.max(t));
        let Some(tick) = cadence.next_after(from) else {
            debug!(%cadence, "no further ticks representable; stopping schedule");
            break;
        };
        let wait = (tick - now).to_std().unwrap_or(Duration::ZERO);
        debug!(%cadence, next_tick = %tick, wait_ms = wait.as_millis() as u64, "waiting for next tick");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => break,
        }

        let Some(logical_ts) = cadence.logical_ts_for(tick) else {
            break;
        };
        info!(%cadence, tick = %tick, logical_ts = %logical_ts, "schedule tick");
        trigger(logical_ts).await;
        runs += 1;
        last_tick = Some(tick);

        if cancel.is_cancelled() {
            break;
        }
    }

    info!(runs, "schedule stopped");
    runs
}
