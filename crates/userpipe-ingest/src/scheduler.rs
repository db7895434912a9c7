//! Daily trigger and run loop
//!
//! The scheduler knows nothing about the pipeline itself: it asks a
//! [`Trigger`] when to fire next, sleeps until then, and invokes whatever job
//! it was given. Missed fire times are not backfilled.

use crate::pipeline::RunReport;
use chrono::{Days, Local, NaiveDateTime, NaiveTime};
use std::future::Future;
use tracing::{error, info, warn};
use userpipe_common::Result;

/// Decides when the next run happens
pub trait Trigger {
    /// First fire time strictly after `after` (local wall-clock time)
    fn next_after(&self, after: NaiveDateTime) -> NaiveDateTime;
}

/// Fires once a day at a fixed local time (midnight by default)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Daily {
    at: NaiveTime,
}

impl Default for Daily {
    fn default() -> Self {
        Self { at: NaiveTime::MIN }
    }
}

impl Trigger for Daily {
    fn next_after(&self, after: NaiveDateTime) -> NaiveDateTime {
        let today = after.date().and_time(self.at);
        if today > after {
            today
        } else {
            // `Days::new(1)` cannot overflow for any realistic date.
            after
                .date()
                .checked_add_days(Days::new(1))
                .unwrap_or(after.date())
                .and_time(self.at)
        }
    }
}

/// Run loop driving a job from a [`Trigger`]
pub struct Scheduler<T> {
    trigger: T,
    run_on_start: bool,
}

impl<T: Trigger> Scheduler<T> {
    pub fn new(trigger: T) -> Self {
        Self {
            trigger,
            run_on_start: false,
        }
    }

    /// Also run once immediately, before waiting for the first fire time
    pub fn run_on_start(mut self, enabled: bool) -> Self {
        self.run_on_start = enabled;
        self
    }

    /// Invoke `job` at every fire time until `shutdown` resolves.
    ///
    /// A failed run is logged and the loop carries on with the next fire
    /// time. Returns the number of runs started.
    pub async fn run<F, Fut, S>(self, mut job: F, shutdown: S) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RunReport>>,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut runs = 0usize;

        if self.run_on_start {
            runs += 1;
            log_run(job().await);
        }

        let mut last_fire = None;

        loop {
            let now = Local::now().naive_local();
            let next = next_fire(&self.trigger, now, last_fire);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, wait_secs = wait.as_secs(), "Waiting for next scheduled run");

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!(runs, "Scheduler stopping");
                    return runs;
                }
                _ = tokio::time::sleep(wait) => {}
            }

            last_fire = Some(next);
            runs += 1;
            log_run(job().await);
        }
    }
}

/// Next fire time after `now`, and never at or before the one already fired.
///
/// The wait is measured on the monotonic clock, so a run can start slightly
/// before its wall-clock fire time.
fn next_fire<T: Trigger>(
    trigger: &T,
    now: NaiveDateTime,
    last_fire: Option<NaiveDateTime>,
) -> NaiveDateTime {
    let after = last_fire.map_or(now, |last| last.max(now));
    trigger.next_after(after)
}

fn log_run(result: Result<RunReport>) {
    match result {
        Ok(report) if report.outcome.is_committed() => info!(
            fetched = report.fetched,
            rows = report.outcome.rows(),
            "Scheduled run succeeded"
        ),
        Ok(report) => warn!(
            fetched = report.fetched,
            outcome = ?report.outcome,
            "Scheduled run completed but loaded nothing"
        ),
        Err(e) => error!(error = %e, "Scheduled run failed"),
    }
}
