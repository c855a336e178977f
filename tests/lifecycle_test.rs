//! Integration tests for the task lifecycle engine against real storage.

use chrono::{Days, Local, NaiveDate};
use tempfile::TempDir;
use trackd::storage::Storage;
use trackd::tasks::lifecycle;
use trackd::tasks::model::{NewTask, Task, TaskPatch, TaskStatus};
use trackd::Error;

/// Helper: create a fresh Storage in a temp dir
async fn make_storage(dir: &TempDir) -> Storage {
    Storage::new(dir.path()).await.expect("storage init failed")
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn new_task(employee_id: i64, topic: &str, status: Option<TaskStatus>) -> NewTask {
    NewTask {
        employee_id,
        topic: topic.to_string(),
        subtopic: String::new(),
        description: "integration fixture".to_string(),
        date: today(),
        start_date: today(),
        end_date: None,
        expected_hours: 8,
        completed_hours: 0,
        priority: 1,
        status,
    }
}

fn patch_from(task: &Task, status: TaskStatus) -> TaskPatch {
    TaskPatch {
        employee_id: task.employee_id,
        topic: task.topic.clone(),
        subtopic: task.subtopic.clone(),
        description: task.description.clone(),
        date: task.date,
        start_date: task.start_date,
        end_date: task.end_date,
        expected_hours: task.expected_hours,
        completed_hours: task.completed_hours,
        priority: task.priority,
        status,
    }
}

#[tokio::test]
async fn create_defaults_status_to_not_started() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let task = lifecycle::create_task(&storage, &new_task(1, "write docs", None))
        .await
        .expect("create");
    assert_eq!(task.status, TaskStatus::NotStarted);
    assert!(task.assigned_by.is_none(), "self-created tasks are private");
}

#[tokio::test]
async fn update_unknown_task_is_not_found() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let task = lifecycle::create_task(&storage, &new_task(1, "probe", None))
        .await
        .unwrap();
    let patch = patch_from(&task, TaskStatus::InProgress);
    let err = lifecycle::update_task(&storage, 9999, &patch).await.unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(9999)));
}

#[tokio::test]
async fn direct_completion_is_rejected_and_row_unchanged() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let task = lifecycle::create_task(&storage, &new_task(1, "ship release", None))
        .await
        .unwrap();

    // Attempt Not Started → Completed, also smuggling in other field edits.
    let mut patch = patch_from(&task, TaskStatus::Completed);
    patch.completed_hours = 40;
    patch.topic = "something else".to_string();

    let err = lifecycle::update_task(&storage, task.task_id, &patch)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    // The whole update failed — no partial field writes.
    let stored = storage.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::NotStarted);
    assert_eq!(stored.completed_hours, 0);
    assert_eq!(stored.topic, "ship release");
}

#[tokio::test]
async fn completing_a_task_stamps_end_date() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let task = lifecycle::create_task(
        &storage,
        &new_task(1, "migrate database", Some(TaskStatus::InProgress)),
    )
    .await
    .unwrap();

    let mut patch = patch_from(&task, TaskStatus::Completed);
    // A caller-supplied end date is ignored in favor of the stamp.
    patch.end_date = Some(today() + Days::new(30));

    let updated = lifecycle::update_task(&storage, task.task_id, &patch)
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Completed);
    assert_eq!(updated.end_date, Some(today()));

    let stored = storage.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(stored.end_date, Some(today()));
}

#[tokio::test]
async fn earlier_working_date_is_kept_while_other_fields_apply() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let task = lifecycle::create_task(
        &storage,
        &new_task(1, "review PRs", Some(TaskStatus::InProgress)),
    )
    .await
    .unwrap();

    let mut patch = patch_from(&task, TaskStatus::InProgress);
    patch.date = task.date - Days::new(3);
    patch.completed_hours = 5;

    let updated = lifecycle::update_task(&storage, task.task_id, &patch)
        .await
        .unwrap();
    assert_eq!(updated.date, task.date, "working date must not regress");
    assert_eq!(updated.completed_hours, 5);
}

#[tokio::test]
async fn overdue_task_can_still_be_completed() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let task = lifecycle::create_task(&storage, &new_task(1, "late report", Some(TaskStatus::Overdue)))
        .await
        .unwrap();
    let patch = patch_from(&task, TaskStatus::Completed);
    let updated = lifecycle::update_task(&storage, task.task_id, &patch)
        .await
        .unwrap();
    assert_eq!(updated.status, TaskStatus::Completed);
    assert_eq!(updated.end_date, Some(today()));
}

#[tokio::test]
async fn assignment_requires_the_manager_role() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let worker = storage
        .create_employee("amit", "amit@example.com", "contributor", None)
        .await
        .unwrap();

    // A contributor cannot assign.
    let err = lifecycle::assign_task(
        &storage,
        &new_task(worker.employee_id, "budget review", None),
        worker.employee_id,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::NotAManager(_)));
}

#[tokio::test]
async fn assignment_requires_an_existing_assignee() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let boss = storage
        .create_employee("mira", "mira@example.com", "manager", None)
        .await
        .unwrap();

    let err = lifecycle::assign_task(
        &storage,
        &new_task(4242, "orphan task", None),
        boss.employee_id,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::EmployeeNotFound(4242)));
}

#[tokio::test]
async fn assignment_stamps_metadata_and_zeroes_completed_hours() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let boss = storage
        .create_employee("mira", "mira@example.com", "manager", None)
        .await
        .unwrap();
    let worker = storage
        .create_employee("amit", "amit@example.com", "contributor", Some(boss.employee_id))
        .await
        .unwrap();

    let mut new = new_task(worker.employee_id, "onboarding deck", None);
    new.completed_hours = 12; // must be reset by the engine

    let task = lifecycle::assign_task(&storage, &new, boss.employee_id, Some("Mira".to_string()))
        .await
        .unwrap();
    assert_eq!(task.assigned_by, Some(boss.employee_id));
    assert!(task.assigned_date.is_some());
    assert_eq!(task.assigned_manager.as_deref(), Some("Mira"));
    assert_eq!(task.completed_hours, 0);
    assert!(task.is_assigned());
}

#[tokio::test]
async fn delete_removes_the_row_and_reports_unknown_ids() {
    let dir = TempDir::new().unwrap();
    let storage = make_storage(&dir).await;

    let task = lifecycle::create_task(&storage, &new_task(1, "throwaway", None))
        .await
        .unwrap();
    lifecycle::delete_task(&storage, task.task_id).await.unwrap();
    assert!(storage.get_task(task.task_id).await.unwrap().is_none());

    let err = lifecycle::delete_task(&storage, task.task_id).await.unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
}
