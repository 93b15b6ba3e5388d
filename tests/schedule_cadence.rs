// tests/schedule_cadence.rs

mod common;
use crate::common::{TestResult, init_tracing, with_timeout};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use loadgate::schedule::{Cadence, run_on_schedule};

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 11, 1, h, m, s).unwrap()
}

#[test]
fn parses_supported_forms() -> TestResult {
    for s in ["@hourly", "hourly", "0 * * * *", "  0  *  * * * ", "@HOURLY"] {
        assert_eq!(s.parse::<Cadence>()?, Cadence::Hourly, "{s}");
    }
    for s in ["@daily", "daily", "0 0 * * *"] {
        assert_eq!(s.parse::<Cadence>()?, Cadence::Daily, "{s}");
    }
    assert_eq!(
        "every 30m".parse::<Cadence>()?,
        Cadence::Every(Duration::from_secs(30 * 60))
    );
    assert_eq!(
        "every 250ms".parse::<Cadence>()?,
        Cadence::Every(Duration::from_millis(250))
    );
    Ok(())
}

#[test]
fn rejects_unsupported_forms() {
    for s in ["", "*/5 * * * *", "weekly", "every", "every 0s", "every 5 fortnights"] {
        assert!(s.parse::<Cadence>().is_err(), "{s:?} should be rejected");
    }
}

#[test]
fn hourly_ticks_fall_on_the_hour() {
    let cadence = Cadence::Hourly;
    assert_eq!(cadence.next_after(at(13, 20, 5)), Some(at(14, 0, 0)));
    // Strictly after.
    assert_eq!(cadence.next_after(at(14, 0, 0)), Some(at(15, 0, 0)));
    assert_eq!(cadence.logical_ts_for(at(14, 0, 0)), Some(at(13, 0, 0)));
}

#[test]
fn daily_ticks_fall_on_utc_midnight() {
    let cadence = Cadence::Daily;
    let next = cadence.next_after(at(13, 20, 5));
    assert_eq!(next, Some(Utc.with_ymd_and_hms(2018, 11, 2, 0, 0, 0).unwrap()));
    assert_eq!(
        next.and_then(|t| cadence.logical_ts_for(t)),
        Some(Utc.with_ymd_and_hms(2018, 11, 1, 0, 0, 0).unwrap())
    );
}

#[test]
fn every_ticks_are_epoch_aligned() {
    let cadence = Cadence::Every(Duration::from_secs(15 * 60));
    assert_eq!(cadence.next_after(at(13, 20, 5)), Some(at(13, 30, 0)));
    assert_eq!(cadence.logical_ts_for(at(13, 30, 0)), Some(at(13, 15, 0)));
}

#[test]
fn display_round_trips_named_cadences() -> TestResult {
    for cadence in [Cadence::Hourly, Cadence::Daily] {
        assert_eq!(cadence.to_string().parse::<Cadence>()?, cadence);
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn triggers_one_run_per_tick_until_cancelled() -> TestResult {
    init_tracing();
    let cadence = Cadence::Every(Duration::from_millis(100));
    let cancel = CancellationToken::new();
    let seen: Arc<Mutex<Vec<DateTime<Utc>>>> = Arc::default();

    let runs = {
        let seen = seen.clone();
        let cancel_after = cancel.clone();
        with_timeout(run_on_schedule(cadence, cancel.clone(), move |logical_ts| {
            let seen = seen.clone();
            let cancel_after = cancel_after.clone();
            async move {
                let mut guard = seen.lock().unwrap();
                guard.push(logical_ts);
                if guard.len() == 3 {
                    cancel_after.cancel();
                }
            }
        }))
        .await
    };

    assert_eq!(runs, 3);
    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    for pair in seen.windows(2) {
        assert!(pair[1] > pair[0], "ticks must not repeat: {seen:?}");
    }
    for ts in &seen {
        assert_eq!(ts.timestamp_millis() % 100, 0, "logical ts is interval aligned");
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_first_tick_runs_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let runs = with_timeout(run_on_schedule(Cadence::Hourly, cancel, |_| async {
        let fired = true;
        assert!(!fired, "no tick should fire");
    }))
    .await;

    assert_eq!(runs, 0);
}
