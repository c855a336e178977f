//! Per-employee digest rendering.

use std::fmt::Write as _;

use crate::storage::EmployeeRow;
use crate::tasks::model::Task;

pub const DIGEST_SUBJECT: &str = "Daily Task Update Reminder";

/// Render one employee's digest as an HTML email body. Lists each task's id,
/// topic, status, working date, and description.
pub fn render(employee: &EmployeeRow, tasks: &[Task]) -> String {
    let mut items = String::new();
    for task in tasks {
        let _ = write!(
            items,
            "<p>Task ID: {}</p>\
             <p>Topic: {}</p>\
             <p>Status: {}</p>\
             <p>Date: {}</p>\
             <p>Description: {}</p>\
             <hr/>",
            task.task_id, task.topic, task.status, task.date, task.description
        );
    }

    format!(
        "<html><body>\
         <h2>{DIGEST_SUBJECT}</h2>\
         <p>Hello {},</p>\
         <p>Please update your tasks for today. Here are your current tasks:</p>\
         {items}\
         <p>Thank you!</p>\
         </body></html>",
        employee.username
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::TaskStatus;
    use chrono::NaiveDate;

    fn employee() -> EmployeeRow {
        EmployeeRow {
            employee_id: 3,
            username: "dana".into(),
            email: "dana@example.com".into(),
            role: "contributor".into(),
            manager_id: None,
        }
    }

    fn task(id: i64, topic: &str) -> Task {
        Task {
            task_id: id,
            employee_id: 3,
            topic: topic.into(),
            subtopic: String::new(),
            description: "write the draft".into(),
            date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: None,
            expected_hours: 8,
            completed_hours: 0,
            priority: 1,
            status: TaskStatus::InProgress,
            assigned_by: None,
            assigned_date: None,
            assigned_manager: None,
        }
    }

    #[test]
    fn digest_lists_every_task_with_its_fields() {
        let body = render(&employee(), &[task(11, "Release notes"), task(12, "Retro prep")]);
        assert!(body.contains("Hello dana,"));
        assert!(body.contains("Task ID: 11"));
        assert!(body.contains("Topic: Release notes"));
        assert!(body.contains("Task ID: 12"));
        assert!(body.contains("Status: In Progress"));
        assert!(body.contains("Date: 2024-06-10"));
        assert!(body.contains("Description: write the draft"));
    }
}
