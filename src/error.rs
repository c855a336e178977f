use thiserror::Error;

use crate::tasks::model::TaskStatus;

/// Errors surfaced by the task engine to synchronous callers.
///
/// Background loops never propagate these — they log and retry on the next
/// scheduled occurrence. A `Store` error during a batch leaves no partial
/// state behind because every batch commits in a single transaction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("task {0} not found")]
    TaskNotFound(i64),

    #[error("employee {0} not found")]
    EmployeeNotFound(i64),

    #[error("employee {0} not found or does not hold the manager role")]
    NotAManager(i64),

    #[error("cannot change status directly from '{from}' to '{to}' — move the task to 'In Progress' first")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("unknown task status '{0}'")]
    UnknownStatus(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}
