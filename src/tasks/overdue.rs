//! Overdue classifier.
//!
//! Relabels tasks whose planned end date has passed while still incomplete.
//! Idempotent by construction: once a task is `Overdue` it no longer matches
//! the selection predicate, so a second run is a no-op.

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::storage::Storage;

/// Mark every incomplete task with a passed end date as `Overdue`.
///
/// Selects `status ∈ {Not Started, In Progress} AND end_date < today` and
/// relabels all matches in one transaction, touching no other field.
/// Returns the number of tasks relabeled.
pub async fn mark_overdue_tasks(storage: &Storage, today: NaiveDate) -> Result<u64, sqlx::Error> {
    let mut tx = storage.pool().begin().await?;

    let expired: Vec<(i64, NaiveDate)> = sqlx::query_as(
        "SELECT task_id, end_date FROM tasks \
         WHERE status IN ('Not Started', 'In Progress') \
           AND end_date IS NOT NULL AND end_date < ?",
    )
    .bind(today)
    .fetch_all(&mut *tx)
    .await?;

    if expired.is_empty() {
        return Ok(0);
    }

    for (task_id, end_date) in &expired {
        sqlx::query("UPDATE tasks SET status = 'Overdue' WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        debug!(task_id, due = %end_date, "task marked overdue");
    }

    tx.commit().await?;
    Ok(expired.len() as u64)
}

/// Background classifier loop — one pass every 24 h, first pass at startup.
/// Exits on the shutdown signal.
pub async fn run_overdue_loop(storage: Arc<Storage>, mut shutdown: watch::Receiver<bool>) {
    info!("overdue classifier started (24h interval)");
    let mut ticker = interval(Duration::from_secs(24 * 60 * 60));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("overdue classifier stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        match mark_overdue_tasks(&storage, Local::now().date_naive()).await {
            Ok(n) if n > 0 => info!(marked = n, "overdue pass complete"),
            Ok(_) => {}
            Err(e) => warn!(err = %e, "overdue pass failed — will retry next cycle"),
        }
    }
}
