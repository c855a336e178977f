//! Integration tests for the read-side query surface.

use chrono::{Days, NaiveDate};
use tempfile::TempDir;
use trackd::storage::Storage;
use trackd::tasks::lifecycle;
use trackd::tasks::model::{NewTask, TaskStatus};

async fn make_storage(dir: &TempDir) -> Storage {
    Storage::new(dir.path()).await.expect("storage init failed")
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Seed<'a> {
    storage: &'a Storage,
}

impl Seed<'_> {
    async fn task(
        &self,
        employee_id: i64,
        topic: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
        status: TaskStatus,
        priority: i64,
    ) -> i64 {
        let new = NewTask {
            employee_id,
            topic: topic.to_string(),
            subtopic: String::new(),
            description: String::new(),
            date: start,
            start_date: start,
            end_date: end,
            expected_hours: 4,
            completed_hours: 0,
            priority,
            status: Some(status),
        };
        lifecycle::create_task(self.storage, &new)
            .await
            .unwrap()
            .task_id
    }
}

#[tokio::test]
async fn private_and_assigned_listings_split_on_assigned_by() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;
    let seed = Seed { storage: &storage };

    let boss = storage
        .create_employee("mira", "mira@example.com", "manager", None)
        .await
        .unwrap();
    let worker = storage
        .create_employee("amit", "amit@example.com", "contributor", None)
        .await
        .unwrap();

    let start = day(2024, 6, 1);
    let private_id = seed
        .task(worker.employee_id, "own errand", start, None, TaskStatus::NotStarted, 1)
        .await;

    let new = NewTask {
        employee_id: worker.employee_id,
        topic: "handed down".to_string(),
        subtopic: String::new(),
        description: String::new(),
        date: start,
        start_date: start,
        end_date: None,
        expected_hours: 4,
        completed_hours: 0,
        priority: 2,
        status: None,
    };
    let assigned = lifecycle::assign_task(&storage, &new, boss.employee_id, None)
        .await
        .unwrap();

    let private = storage.private_tasks(worker.employee_id).await.unwrap();
    assert_eq!(private.len(), 1);
    assert_eq!(private[0].task_id, private_id);

    let handed = storage.assigned_tasks(worker.employee_id).await.unwrap();
    assert_eq!(handed.len(), 1);
    assert_eq!(handed[0].task_id, assigned.task_id);
}

#[tokio::test]
async fn active_query_requires_a_started_uncompleted_window() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;
    let seed = Seed { storage: &storage };
    let today = day(2024, 6, 10);

    let started_open = seed
        .task(1, "started, open-ended", today - Days::new(2), None, TaskStatus::NotStarted, 1)
        .await;
    let started_live = seed
        .task(1, "started, in window", today - Days::new(2), Some(today + Days::new(5)), TaskStatus::InProgress, 2)
        .await;
    // Excluded: not started yet, window passed, wrong status.
    seed.task(1, "starts tomorrow", today + Days::new(1), None, TaskStatus::NotStarted, 3)
        .await;
    seed.task(1, "window passed", today - Days::new(9), Some(today - Days::new(1)), TaskStatus::InProgress, 4)
        .await;
    seed.task(1, "already pending", today - Days::new(2), None, TaskStatus::Pending, 5)
        .await;

    let active = storage.active_tasks(today, None).await.unwrap();
    let ids: Vec<_> = active.iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec![started_open, started_live], "ordered by priority");
}

#[tokio::test]
async fn overdue_view_includes_flagged_and_implicitly_expired_tasks() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;
    let seed = Seed { storage: &storage };
    let today = day(2024, 6, 10);

    let flagged = seed
        .task(1, "already flagged", day(2024, 6, 1), Some(day(2024, 6, 5)), TaskStatus::Overdue, 1)
        .await;
    let implicit = seed
        .task(2, "expired, unflagged", day(2024, 6, 1), Some(today - Days::new(1)), TaskStatus::InProgress, 2)
        .await;
    // Completed tasks never show up as overdue.
    seed.task(1, "finished late", day(2024, 6, 1), Some(today - Days::new(1)), TaskStatus::Completed, 3)
        .await;

    let all = storage.overdue_tasks(today, None).await.unwrap();
    let ids: Vec<_> = all.iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec![flagged, implicit]);

    let only_emp2 = storage.overdue_tasks(today, Some(2)).await.unwrap();
    assert_eq!(only_emp2.len(), 1);
    assert_eq!(only_emp2[0].task_id, implicit);
}

#[tokio::test]
async fn date_and_status_filters_combine() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;
    let seed = Seed { storage: &storage };

    let target = day(2024, 6, 10);
    let hit = seed
        .task(1, "on the day", target, None, TaskStatus::InProgress, 1)
        .await;
    seed.task(1, "other day", target + Days::new(1), None, TaskStatus::InProgress, 2)
        .await;
    seed.task(1, "other status", target, None, TaskStatus::Pending, 3)
        .await;

    let found = storage
        .tasks_by_date_and_status(target, TaskStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].task_id, hit);
}
