//! Status lifecycle engine.
//!
//! Every mutation of a task row flows through here. The transition rules live
//! in [`apply_patch`], a pure function over (current task, patch, today) —
//! deterministic, so the storage-coupled wrappers stay thin and the rules are
//! testable without a database.

use chrono::{Local, Utc};
use tracing::{info, warn};

use crate::error::Error;
use crate::storage::{Storage, ROLE_MANAGER};
use crate::tasks::model::{Assignment, NewTask, Task, TaskPatch, TaskStatus};

/// Apply a full-field patch to a task, enforcing the transition rules.
///
/// The single illegal edge is `Not Started → Completed`: a task must pass
/// through some other state first. Every other combination is permitted,
/// including backward moves — that is the authoritative contract, not a gap.
///
/// On a transition into `Completed` the end date is stamped to
/// `completed_on` and the caller-supplied date fields are ignored. On any
/// other update the working date only moves forward; a regressing date is
/// dropped while the rest of the patch still applies.
pub fn apply_patch(current: &Task, patch: &TaskPatch, completed_on: chrono::NaiveDate) -> Result<Task, Error> {
    let from = current.status;
    let to = patch.status;

    if from != to && from == TaskStatus::NotStarted && to == TaskStatus::Completed {
        return Err(Error::InvalidTransition { from, to });
    }

    let mut next = current.clone();
    next.employee_id = patch.employee_id;
    next.topic = patch.topic.clone();
    next.subtopic = patch.subtopic.clone();
    next.description = patch.description.clone();

    if to == TaskStatus::Completed && from != TaskStatus::Completed {
        next.end_date = Some(completed_on);
    } else {
        if patch.date >= current.date {
            next.date = patch.date;
        }
        next.start_date = patch.start_date;
        next.end_date = patch.end_date;
    }

    next.completed_hours = patch.completed_hours;
    next.expected_hours = patch.expected_hours;
    next.priority = patch.priority;
    next.status = to;

    Ok(next)
}

/// Create a private task. Status defaults to `Not Started` when omitted.
pub async fn create_task(storage: &Storage, new: &NewTask) -> Result<Task, Error> {
    let status = new.status.unwrap_or_default();
    let task = storage.insert_task(new, status, None).await?;
    info!(task_id = task.task_id, status = %task.status, "created new task");
    Ok(task)
}

/// Manager-assignment operation: create a task on another employee's plate.
///
/// The assigner must exist and hold the manager role; the assignee must
/// exist. Completed hours start at zero regardless of the request, and the
/// assignment timestamp is taken now, not from the caller.
pub async fn assign_task(
    storage: &Storage,
    new: &NewTask,
    assigned_by: i64,
    assigned_manager: Option<String>,
) -> Result<Task, Error> {
    let manager = storage
        .get_employee(assigned_by)
        .await?
        .filter(|e| e.role == ROLE_MANAGER)
        .ok_or(Error::NotAManager(assigned_by))?;

    if storage.get_employee(new.employee_id).await?.is_none() {
        return Err(Error::EmployeeNotFound(new.employee_id));
    }

    let mut new = new.clone();
    new.completed_hours = 0;
    let status = new.status.unwrap_or_default();
    let assignment = Assignment {
        assigned_by,
        assigned_date: Utc::now(),
        assigned_manager,
    };
    let task = storage.insert_task(&new, status, Some(&assignment)).await?;
    info!(
        task_id = task.task_id,
        employee_id = task.employee_id,
        manager_id = manager.employee_id,
        "assigned task to employee"
    );
    Ok(task)
}

/// Update a task through the lifecycle rules.
///
/// The read-validate-write sequence runs inside one transaction so a
/// concurrent edit to the same row happens fully before or fully after this
/// one. An illegal transition rolls the whole update back — no partial field
/// writes.
pub async fn update_task(storage: &Storage, task_id: i64, patch: &TaskPatch) -> Result<Task, Error> {
    let mut tx = storage.pool().begin().await?;

    let current: Option<Task> = sqlx::query_as("SELECT * FROM tasks WHERE task_id = ?")
        .bind(task_id)
        .fetch_optional(&mut *tx)
        .await?;
    let current = current.ok_or(Error::TaskNotFound(task_id))?;

    let next = apply_patch(&current, patch, Local::now().date_naive())?;

    let completing = patch.status == TaskStatus::Completed && current.status != TaskStatus::Completed;
    if !completing && patch.date < current.date {
        warn!(
            task_id,
            stored = %current.date,
            supplied = %patch.date,
            "attempted to move task back in time — keeping stored date"
        );
    }

    sqlx::query(
        "UPDATE tasks SET employee_id = ?, topic = ?, subtopic = ?, description = ?, \
                          date = ?, start_date = ?, end_date = ?, expected_hours = ?, \
                          completed_hours = ?, priority = ?, status = ? \
         WHERE task_id = ?",
    )
    .bind(next.employee_id)
    .bind(&next.topic)
    .bind(&next.subtopic)
    .bind(&next.description)
    .bind(next.date)
    .bind(next.start_date)
    .bind(next.end_date)
    .bind(next.expected_hours)
    .bind(next.completed_hours)
    .bind(next.priority)
    .bind(next.status)
    .bind(task_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if current.status != next.status {
        info!(
            task_id,
            from = %current.status,
            to = %next.status,
            "changed task status"
        );
    }
    Ok(next)
}

/// Administrative delete.
pub async fn delete_task(storage: &Storage, task_id: i64) -> Result<(), Error> {
    if storage.delete_task(task_id).await? {
        info!(task_id, "deleted task");
        Ok(())
    } else {
        Err(Error::TaskNotFound(task_id))
    }
}
