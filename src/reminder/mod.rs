//! Reminder scheduler.
//!
//! A singleton loop, started once at boot, that wakes at a configured
//! wall-clock time each day and mails every contributor a digest of their
//! tasks. The loop never returns under normal operation: a failed pass is
//! logged and swallowed, and the next wake time is computed regardless —
//! only the shutdown signal stops it.

pub mod digest;

use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ReminderConfig;
use crate::error::Error;
use crate::notify::Notifier;
use crate::storage::{Storage, ROLE_CONTRIBUTOR};

/// Outcome of one reminder pass. Per-recipient failures are counted, not
/// propagated — the pass as a whole still succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassSummary {
    pub sent: usize,
    pub failed: usize,
}

/// The next instant at or after `now` that falls on `hour:minute` local
/// time. A start at 10:00 with a 09:00 schedule yields tomorrow 09:00, not
/// an immediate run.
pub fn next_run_after(now: DateTime<Local>, hour: u32, minute: u32) -> DateTime<Local> {
    let mut day = now.date_naive();
    loop {
        // A nonexistent local time (DST gap) falls through to the next day.
        if let Some(target) = day
            .and_hms_opt(hour, minute, 0)
            .and_then(|naive| naive.and_local_timezone(Local).earliest())
        {
            if target > now {
                return target;
            }
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => return now + chrono::Duration::days(1),
        }
    }
}

/// Run exactly one reminder pass: every contributor with at least one task
/// gets a single digest email. This is also the manual-trigger entry point.
pub async fn run_reminder_pass(
    storage: &Storage,
    notifier: &dyn Notifier,
) -> Result<PassSummary, Error> {
    let contributors = storage.employees_by_role(ROLE_CONTRIBUTOR).await?;
    info!(count = contributors.len(), "sending task update reminders");

    let mut summary = PassSummary::default();
    for employee in &contributors {
        let tasks = match storage.tasks_for_employee(employee.employee_id).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(
                    employee_id = employee.employee_id,
                    err = %e,
                    "failed to load tasks for reminder — skipping employee"
                );
                summary.failed += 1;
                continue;
            }
        };
        if tasks.is_empty() {
            continue;
        }

        let body = digest::render(employee, &tasks);
        match notifier
            .send(&employee.email, digest::DIGEST_SUBJECT, &body)
            .await
        {
            Ok(()) => {
                info!(email = %employee.email, tasks = tasks.len(), "task reminder sent");
                summary.sent += 1;
            }
            Err(e) => {
                warn!(email = %employee.email, err = %e, "failed to send reminder");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

/// Daily reminder loop. Sleeps until the configured time, runs a pass,
/// repeats. Exits only on the shutdown signal.
pub async fn run_reminder_loop(
    storage: Arc<Storage>,
    notifier: Arc<dyn Notifier>,
    config: ReminderConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        hour = config.hour,
        minute = config.minute,
        "reminder scheduler started"
    );

    loop {
        let now = Local::now();
        let next_run = next_run_after(now, config.hour, config.minute);
        let wait = (next_run - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        info!(next_run = %next_run, wait_secs = wait.as_secs(), "next reminder pass scheduled");

        tokio::select! {
            _ = shutdown.changed() => {
                info!("reminder scheduler stopping");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match run_reminder_pass(&storage, notifier.as_ref()).await {
            Ok(summary) => info!(
                sent = summary.sent,
                failed = summary.failed,
                "reminder pass complete"
            ),
            Err(e) => warn!(err = %e, "reminder pass failed — will retry at next occurrence"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn start_before_target_fires_same_day() {
        let now = Local.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
        let next = next_run_after(now, 9, 0);
        assert_eq!(next.date_naive(), now.date_naive());
        assert_eq!((next.hour(), next.minute()), (9, 0));
    }

    #[test]
    fn start_after_target_fires_next_day() {
        // Process boots at 10:00 with a 09:00 schedule — first pass is
        // tomorrow, not immediately.
        let now = Local.with_ymd_and_hms(2024, 6, 10, 10, 0, 0).unwrap();
        let next = next_run_after(now, 9, 0);
        assert_eq!(
            next.date_naive(),
            now.date_naive().succ_opt().unwrap()
        );
        assert_eq!((next.hour(), next.minute()), (9, 0));
    }

    #[test]
    fn start_exactly_at_target_fires_next_day() {
        let now = Local.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap();
        let next = next_run_after(now, 9, 0);
        assert!(next > now);
        assert_eq!(next.date_naive(), now.date_naive().succ_opt().unwrap());
    }
}
