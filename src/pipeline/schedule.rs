// src/pipeline/schedule.rs

//! Daily trigger and cycle serialization.
//!
//! Cycles never interleave: a trigger that finds the engine busy is skipped.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::sync::{Mutex, watch};

use crate::error::Result;
use crate::models::ScheduleConfig;
use crate::pipeline::engine::{CycleReport, Engine, Trigger};

/// The engine as shared between the scheduler and on-demand commands.
pub type SharedEngine = Arc<Mutex<Engine>>;

/// Requests a stop; cycles observe it between network steps.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes a stop request.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// A signal that is never raised.
    pub fn never() -> Self {
        let (_, signal) = stop_signal();
        signal
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until a stop is requested.
    pub async fn stopped(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            // Handle dropped without stopping.
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_signal() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// First moment strictly after `now` whose wall-clock time is `at`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Run a cycle unless one is already in progress.
///
/// Returns `None` when the trigger was skipped.
pub async fn trigger_cycle(
    engine: &SharedEngine,
    trigger: Trigger,
    stop: &StopSignal,
) -> Option<Result<CycleReport>> {
    let Ok(mut engine) = engine.try_lock() else {
        log::warn!("A check cycle is already running; {} trigger skipped", trigger);
        return None;
    };
    Some(engine.run_cycle(trigger, stop).await)
}

/// Fires a check cycle once a day at a fixed local time.
pub struct Scheduler {
    engine: SharedEngine,
    at: NaiveTime,
}

impl Scheduler {
    pub fn new(engine: SharedEngine, schedule: &ScheduleConfig) -> Result<Self> {
        Ok(Self {
            engine,
            at: schedule.time()?,
        })
    }

    /// Loop until `stop` is raised.
    pub async fn run(&self, mut stop: StopSignal) {
        loop {
            let now = Local::now().naive_local();
            let next = next_run_after(now, self.at);
            let wait = (next - now).to_std().unwrap_or_default();
            log::info!("Next scheduled check at {}", next.format("%Y-%m-%d %H:%M"));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop.stopped() => {
                    log::info!("Scheduler stopped");
                    return;
                }
            }

            log::info!("Running scheduled check...");
            match trigger_cycle(&self.engine, Trigger::Scheduled, &stop).await {
                Some(Ok(_)) => log::info!("Scheduled check completed"),
                Some(Err(e)) => log::error!("Scheduled check failed: {}", e),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        let now = day(1).and_time(at(7, 30));
        assert_eq!(next_run_after(now, at(8, 0)), day(1).and_time(at(8, 0)));
    }

    #[test]
    fn test_next_run_tomorrow_when_passed() {
        let now = day(1).and_time(at(9, 0));
        assert_eq!(next_run_after(now, at(8, 0)), day(2).and_time(at(8, 0)));
    }

    #[test]
    fn test_next_run_exactly_now_moves_forward() {
        let now = day(1).and_time(at(8, 0));
        assert_eq!(next_run_after(now, at(8, 0)), day(2).and_time(at(8, 0)));
    }

    #[test]
    fn test_stop_signal() {
        let (handle, signal) = stop_signal();
        let copy = signal.clone();
        assert!(!signal.is_stopped());
        handle.stop();
        assert!(signal.is_stopped());
        assert!(copy.is_stopped());
        assert!(!StopSignal::never().is_stopped());
    }

    #[tokio::test]
    async fn test_stopped_resolves_after_stop() {
        let (handle, mut signal) = stop_signal();
        let waiter = tokio::spawn(async move { signal.stopped().await });
        handle.stop();
        waiter.await.unwrap();
    }
}
