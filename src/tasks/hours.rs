//! Daily-hours ledger: at most one entry per (task, calendar day), last
//! write for a day wins. Entries are never backdated — logging always
//! targets "today".

use chrono::Local;
use tracing::debug;

use crate::error::Error;
use crate::storage::{DailyHoursRow, Storage};

/// Upsert the hours entry for (task, today). Over- or under-logging against
/// the task's expected hours is allowed — no validation here.
pub async fn log_hours(storage: &Storage, task_id: i64, hours_spent: i64) -> Result<(), Error> {
    let today = Local::now().date_naive();
    let mut tx = storage.pool().begin().await?;

    let exists: Option<(i64,)> = sqlx::query_as("SELECT task_id FROM tasks WHERE task_id = ?")
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(Error::TaskNotFound(task_id));
    }

    sqlx::query(
        "INSERT INTO daily_task_hours (task_id, date, hours_spent) VALUES (?, ?, ?) \
         ON CONFLICT(task_id, date) DO UPDATE SET hours_spent = excluded.hours_spent",
    )
    .bind(task_id)
    .bind(today)
    .bind(hours_spent)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    debug!(task_id, date = %today, hours_spent, "logged daily hours");
    Ok(())
}

/// All ledger entries for a task, oldest day first.
pub async fn daily_hours(storage: &Storage, task_id: i64) -> Result<Vec<DailyHoursRow>, Error> {
    if storage.get_task(task_id).await?.is_none() {
        return Err(Error::TaskNotFound(task_id));
    }
    Ok(storage.daily_hours(task_id).await?)
}
