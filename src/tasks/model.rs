//! Task domain types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The finite set of states a task can be in.
///
/// Stored as human-readable TEXT (`"Not Started"`, …) so the table stays
/// directly queryable; the same strings appear in JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum TaskStatus {
    #[serde(rename = "Not Started")]
    #[sqlx(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    #[sqlx(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Pending")]
    #[sqlx(rename = "Pending")]
    Pending,
    #[serde(rename = "Completed")]
    #[sqlx(rename = "Completed")]
    Completed,
    #[serde(rename = "Overdue")]
    #[sqlx(rename = "Overdue")]
    Overdue,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::NotStarted
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Pending => "Pending",
            TaskStatus::Completed => "Completed",
            TaskStatus::Overdue => "Overdue",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = Error;

    /// Accepts the canonical form (`"Not Started"`) as well as the
    /// lowercase/kebab forms people type on a command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "not started" => Ok(TaskStatus::NotStarted),
            "in progress" => Ok(TaskStatus::InProgress),
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "overdue" => Ok(TaskStatus::Overdue),
            _ => Err(Error::UnknownStatus(s.to_string())),
        }
    }
}

/// One unit of trackable work, as stored in the `tasks` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub task_id: i64,
    pub employee_id: i64,
    pub topic: String,
    pub subtopic: String,
    pub description: String,
    /// Working date — the day the task is considered active on. Distinct
    /// from the planned `start_date`/`end_date` window.
    pub date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub expected_hours: i64,
    pub completed_hours: i64,
    /// Lower = more urgent. Display ordering only — no uniqueness constraint.
    pub priority: i64,
    pub status: TaskStatus,
    /// Set when a manager assigned this task; `None` for private tasks.
    pub assigned_by: Option<i64>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub assigned_manager: Option<String>,
}

impl Task {
    /// A task with `assigned_by` set is an "assigned" task, otherwise
    /// "private". The partition is derived, not stored.
    pub fn is_assigned(&self) -> bool {
        self.assigned_by.is_some()
    }
}

/// Fields supplied when creating a task. Status is optional — the lifecycle
/// engine defaults it to `Not Started`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub employee_id: i64,
    pub topic: String,
    pub subtopic: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub expected_hours: i64,
    pub completed_hours: i64,
    pub priority: i64,
    pub status: Option<TaskStatus>,
}

/// Manager-assignment metadata stamped onto a task at creation.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub assigned_by: i64,
    pub assigned_date: DateTime<Utc>,
    pub assigned_manager: Option<String>,
}

/// A full-field update request for an existing task. Every field is supplied;
/// the lifecycle engine decides which of them actually apply (see
/// `lifecycle::apply_patch`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPatch {
    pub employee_id: i64,
    pub topic: String,
    pub subtopic: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub expected_hours: i64,
    pub completed_hours: i64,
    pub priority: i64,
    pub status: TaskStatus,
}
