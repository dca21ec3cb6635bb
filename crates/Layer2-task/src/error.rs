//! Task error types

use crate::state::TaskStatus;
use crate::task::{TaskId, TaskOrigin};
use huddle_foundation::Role;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, TaskError>;

#[derive(Error, Debug)]
pub enum TaskError {
    /// Target status is not adjacent to the current one in the origin's graph
    #[error("Illegal transition {from} -> {to} for {origin} task")]
    IllegalTransition {
        from: TaskStatus,
        to: TaskStatus,
        origin: TaskOrigin,
    },

    /// Compare-and-swap lost a race; someone else moved the task first
    #[error("Task {task_id} is no longer {expected}")]
    ClaimConflict {
        task_id: TaskId,
        expected: TaskStatus,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Role {role} may not move a task out of {status}")]
    RoleNotAuthorized { role: Role, status: TaskStatus },

    #[error("Moving a task to {to} requires an assigned role")]
    MissingAssignee { to: TaskStatus },

    #[error(transparent)]
    Foundation(#[from] huddle_foundation::Error),
}

impl TaskError {
    /// `ClaimConflict` is a normal "someone else got it" outcome
    pub fn is_retryable(&self) -> bool {
        match self {
            TaskError::ClaimConflict { .. } => true,
            TaskError::Foundation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for TaskError {
    fn from(e: rusqlite::Error) -> Self {
        TaskError::Foundation(huddle_foundation::Error::Sqlite(e))
    }
}
