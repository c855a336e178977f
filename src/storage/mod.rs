use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

use crate::tasks::model::{Assignment, NewTask, Task, TaskStatus};

/// Base employee role targeted by daily reminders.
pub const ROLE_CONTRIBUTOR: &str = "contributor";
/// Role required to assign tasks to other employees.
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmployeeRow {
    pub employee_id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub manager_id: Option<i64>,
}

/// One row of the per-task per-day hours ledger.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyHoursRow {
    pub id: i64,
    pub task_id: i64,
    pub date: NaiveDate,
    pub hours_spent: i64,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("trackd.db");
        let opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// The underlying connection pool. The lifecycle engine and batch
    /// processors use it to open their own transactional scopes.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ─── Tasks ──────────────────────────────────────────────────────────────

    /// Insert a task row. `status` arrives already resolved by the lifecycle
    /// engine; `assignment` is set only by the manager-assignment operation.
    pub async fn insert_task(
        &self,
        new: &NewTask,
        status: TaskStatus,
        assignment: Option<&Assignment>,
    ) -> Result<Task, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO tasks (employee_id, topic, subtopic, description, date, start_date, \
                                end_date, expected_hours, completed_hours, priority, status, \
                                assigned_by, assigned_date, assigned_manager) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.employee_id)
        .bind(&new.topic)
        .bind(&new.subtopic)
        .bind(&new.description)
        .bind(new.date)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.expected_hours)
        .bind(new.completed_hours)
        .bind(new.priority)
        .bind(status)
        .bind(assignment.map(|a| a.assigned_by))
        .bind(assignment.map(|a| a.assigned_date))
        .bind(assignment.and_then(|a| a.assigned_manager.clone()))
        .execute(&self.pool)
        .await?;
        let id = result.last_insert_rowid();
        sqlx::query_as("SELECT * FROM tasks WHERE task_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_task(&self, task_id: i64) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// All tasks, most urgent first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM tasks ORDER BY priority ASC")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn tasks_for_employee(&self, employee_id: i64) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM tasks WHERE employee_id = ? ORDER BY priority ASC")
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await
    }

    /// Tasks the employee created for themselves (`assigned_by` is null).
    pub async fn private_tasks(&self, employee_id: i64) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM tasks WHERE employee_id = ? AND assigned_by IS NULL \
             ORDER BY priority ASC",
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Tasks a manager assigned to the employee (`assigned_by` set).
    pub async fn assigned_tasks(&self, employee_id: i64) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM tasks WHERE employee_id = ? AND assigned_by IS NOT NULL \
             ORDER BY priority ASC",
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM tasks WHERE status = ? ORDER BY priority ASC")
            .bind(status)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn tasks_by_date_and_status(
        &self,
        date: NaiveDate,
        status: TaskStatus,
    ) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM tasks WHERE date = ? AND status = ? ORDER BY priority ASC")
            .bind(date)
            .bind(status)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn task_for_employee(
        &self,
        task_id: i64,
        employee_id: i64,
    ) -> Result<Option<Task>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM tasks WHERE task_id = ? AND employee_id = ?")
            .bind(task_id)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Incomplete tasks whose planned window covers `today`: started, and
    /// either open-ended or not yet past the end date.
    pub async fn active_tasks(
        &self,
        today: NaiveDate,
        employee_id: Option<i64>,
    ) -> Result<Vec<Task>, sqlx::Error> {
        match employee_id {
            Some(id) => {
                sqlx::query_as(
                    "SELECT * FROM tasks \
                     WHERE status IN ('Not Started', 'In Progress') \
                       AND start_date <= ? \
                       AND (end_date IS NULL OR end_date >= ?) \
                       AND employee_id = ? \
                     ORDER BY priority ASC",
                )
                .bind(today)
                .bind(today)
                .bind(id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM tasks \
                     WHERE status IN ('Not Started', 'In Progress') \
                       AND start_date <= ? \
                       AND (end_date IS NULL OR end_date >= ?) \
                     ORDER BY priority ASC",
                )
                .bind(today)
                .bind(today)
                .fetch_all(&self.pool)
                .await
            }
        }
    }

    /// Overdue view: already labeled `Overdue`, or end date passed while the
    /// task is still incomplete (covers tasks the classifier has not visited
    /// yet this cycle).
    pub async fn overdue_tasks(
        &self,
        today: NaiveDate,
        employee_id: Option<i64>,
    ) -> Result<Vec<Task>, sqlx::Error> {
        match employee_id {
            Some(id) => {
                sqlx::query_as(
                    "SELECT * FROM tasks \
                     WHERE (status = 'Overdue' \
                            OR (end_date IS NOT NULL AND end_date < ? AND status != 'Completed')) \
                       AND employee_id = ? \
                     ORDER BY priority ASC",
                )
                .bind(today)
                .bind(id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM tasks \
                     WHERE status = 'Overdue' \
                        OR (end_date IS NOT NULL AND end_date < ? AND status != 'Completed') \
                     ORDER BY priority ASC",
                )
                .bind(today)
                .fetch_all(&self.pool)
                .await
            }
        }
    }

    /// The active predicate scoped to one employee — what the reminder digest
    /// and the "incomplete" query both build on.
    pub async fn incomplete_tasks(
        &self,
        employee_id: i64,
        today: NaiveDate,
    ) -> Result<Vec<Task>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM tasks \
             WHERE employee_id = ? \
               AND status IN ('Not Started', 'In Progress') \
               AND start_date <= ? \
               AND (end_date IS NULL OR end_date >= ?)",
        )
        .bind(employee_id)
        .bind(today)
        .bind(today)
        .fetch_all(&self.pool)
        .await
    }

    /// Returns `true` when a row was deleted, `false` when the id was unknown.
    pub async fn delete_task(&self, task_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ─── Daily hours ────────────────────────────────────────────────────────

    pub async fn daily_hours(&self, task_id: i64) -> Result<Vec<DailyHoursRow>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM daily_task_hours WHERE task_id = ? ORDER BY date ASC",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
    }

    // ─── Employees ──────────────────────────────────────────────────────────

    pub async fn create_employee(
        &self,
        username: &str,
        email: &str,
        role: &str,
        manager_id: Option<i64>,
    ) -> Result<EmployeeRow, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO employees (username, email, role, manager_id) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(role)
        .bind(manager_id)
        .execute(&self.pool)
        .await?;
        let id = result.last_insert_rowid();
        sqlx::query_as("SELECT * FROM employees WHERE employee_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
    }

    pub async fn get_employee(&self, employee_id: i64) -> Result<Option<EmployeeRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM employees WHERE employee_id = ?")
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn employees_by_role(&self, role: &str) -> Result<Vec<EmployeeRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM employees WHERE role = ? ORDER BY employee_id ASC")
            .bind(role)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list_employees(&self) -> Result<Vec<EmployeeRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM employees ORDER BY employee_id ASC")
            .fetch_all(&self.pool)
            .await
    }
}
