//! Rollover processor.
//!
//! Unfinished tasks whose working date has fallen on or behind "today" get
//! nudged forward by exactly one day per run — never snapped to today. A
//! task that lagged several days converges toward the present one run at a
//! time; after the processor has been down, daily runs catch it up
//! gradually. That pacing matches the source system and is kept on purpose.

use chrono::{Days, Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::storage::Storage;

/// Advance the working date of every lagging unfinished task by one day.
///
/// Selects `status ∈ {Not Started, In Progress, Pending} AND date ≤ today`
/// and commits all advances in one transaction. Returns the number of tasks
/// advanced; zero is a normal outcome.
pub async fn advance_lagging_tasks(storage: &Storage, today: NaiveDate) -> Result<u64, sqlx::Error> {
    let mut tx = storage.pool().begin().await?;

    let lagging: Vec<(i64, NaiveDate)> = sqlx::query_as(
        "SELECT task_id, date FROM tasks \
         WHERE status IN ('Not Started', 'In Progress', 'Pending') AND date <= ?",
    )
    .bind(today)
    .fetch_all(&mut *tx)
    .await?;

    if lagging.is_empty() {
        return Ok(0);
    }

    let mut advanced = 0u64;
    for (task_id, date) in &lagging {
        let Some(next) = date.checked_add_days(Days::new(1)) else {
            continue;
        };
        sqlx::query("UPDATE tasks SET date = ? WHERE task_id = ?")
            .bind(next)
            .bind(task_id)
            .execute(&mut *tx)
            .await?;
        debug!(task_id, from = %date, to = %next, "rolled task forward");
        advanced += 1;
    }

    tx.commit().await?;
    Ok(advanced)
}

/// Background rollover loop — one pass every 24 h, first pass at startup so
/// a restarted process catches up immediately. Exits on the shutdown signal.
pub async fn run_rollover_loop(storage: Arc<Storage>, mut shutdown: watch::Receiver<bool>) {
    info!("rollover processor started (24h interval)");
    let mut ticker = interval(Duration::from_secs(24 * 60 * 60));

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("rollover processor stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        match advance_lagging_tasks(&storage, Local::now().date_naive()).await {
            Ok(n) if n > 0 => info!(advanced = n, "rollover pass complete"),
            Ok(_) => {}
            Err(e) => warn!(err = %e, "rollover pass failed — will retry next cycle"),
        }
    }
}
