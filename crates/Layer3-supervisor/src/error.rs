//! Supervisor error types

use huddle_driver::DriverError;
use huddle_foundation::{ChatroomId, Role};
use huddle_task::TaskError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, SupervisorError>;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Foundation(#[from] huddle_foundation::Error),

    /// Neither SIGTERM nor SIGKILL made the process go away
    #[error("Failed to terminate process {pid}: {reason}")]
    ProcessTerminationFailure { pid: u32, reason: String },

    #[error("No running agent for {role} in {chatroom_id}")]
    ProcessNotFound { chatroom_id: ChatroomId, role: Role },

    /// Another live supervisor holds the process record
    #[error("Agent process {pid} is owned by supervisor {owner}")]
    AlreadyOwned { pid: u32, owner: u32 },
}

impl SupervisorError {
    pub fn termination(pid: u32, reason: impl ToString) -> Self {
        SupervisorError::ProcessTerminationFailure {
            pid,
            reason: reason.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SupervisorError::Driver(e) => e.is_retryable(),
            SupervisorError::Task(e) => e.is_retryable(),
            SupervisorError::Foundation(e) => e.is_retryable(),
            _ => false,
        }
    }
}
