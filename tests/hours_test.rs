//! Integration tests for the daily-hours ledger.

use chrono::{Days, Local};
use tempfile::TempDir;
use trackd::storage::Storage;
use trackd::tasks::hours::{daily_hours, log_hours};
use trackd::tasks::lifecycle;
use trackd::tasks::model::NewTask;
use trackd::Error;

async fn make_storage(dir: &TempDir) -> Storage {
    Storage::new(dir.path()).await.expect("storage init failed")
}

async fn seed_task(storage: &Storage) -> i64 {
    let today = Local::now().date_naive();
    let new = NewTask {
        employee_id: 1,
        topic: "ledger fixture".to_string(),
        subtopic: String::new(),
        description: String::new(),
        date: today,
        start_date: today,
        end_date: None,
        expected_hours: 8,
        completed_hours: 0,
        priority: 1,
        status: None,
    };
    lifecycle::create_task(storage, &new).await.unwrap().task_id
}

#[tokio::test]
async fn logging_twice_on_the_same_day_keeps_one_entry_with_latest_value() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;
    let task_id = seed_task(&storage).await;

    log_hours(&storage, task_id, 3).await.unwrap();
    log_hours(&storage, task_id, 7).await.unwrap();

    let entries = daily_hours(&storage, task_id).await.unwrap();
    assert_eq!(entries.len(), 1, "upsert must not create a second row");
    assert_eq!(entries[0].hours_spent, 7, "last write wins");
    assert_eq!(entries[0].date, Local::now().date_naive());
}

#[tokio::test]
async fn unknown_task_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let err = log_hours(&storage, 777, 2).await.unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(777)));

    let err = daily_hours(&storage, 777).await.unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(777)));
}

#[tokio::test]
async fn entries_come_back_ordered_by_date_ascending() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;
    let task_id = seed_task(&storage).await;

    // Backfill two earlier days directly — the ledger API itself only ever
    // writes "today".
    let today = Local::now().date_naive();
    for (days_ago, spent) in [(2u64, 4i64), (1, 5)] {
        sqlx::query(
            "INSERT INTO daily_task_hours (task_id, date, hours_spent) VALUES (?, ?, ?)",
        )
        .bind(task_id)
        .bind(today - Days::new(days_ago))
        .bind(spent)
        .execute(storage.pool())
        .await
        .unwrap();
    }
    log_hours(&storage, task_id, 6).await.unwrap();

    let entries = daily_hours(&storage, task_id).await.unwrap();
    let dates: Vec<_> = entries.iter().map(|e| e.date).collect();
    assert_eq!(
        dates,
        vec![today - Days::new(2), today - Days::new(1), today]
    );
    assert_eq!(entries[2].hours_spent, 6);
}
