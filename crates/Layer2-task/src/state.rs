//! Task state machine
//!
//! Two directed graphs, selected by the task's origin:
//!
//! ```text
//! chat:    queued → pending → acknowledged → in_progress → completed
//! backlog: backlog → backlog_acknowledged → in_progress → pending_user_review → completed
//!                                                                            └→ closed
//! ```
//!
//! Everything here is pure. Stores and the lifecycle layer call
//! [`check_transition`] before any write.

use crate::error::{Result, TaskError};
use crate::task::TaskOrigin;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Backlog item not yet attached to the conversation
    Backlog,
    /// Chat task waiting in line
    Queued,
    /// Ready for the assigned role to claim
    Pending,
    /// Claimed, work not started
    Acknowledged,
    /// Agent is working on it
    InProgress,
    /// Backlog item attached to an active message
    BacklogAcknowledged,
    /// Agent finished; a human has to confirm
    PendingUserReview,
    Completed,
    /// Abandoned without completion
    Closed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 9] = [
        TaskStatus::Backlog,
        TaskStatus::Queued,
        TaskStatus::Pending,
        TaskStatus::Acknowledged,
        TaskStatus::InProgress,
        TaskStatus::BacklogAcknowledged,
        TaskStatus::PendingUserReview,
        TaskStatus::Completed,
        TaskStatus::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Queued => "queued",
            TaskStatus::Pending => "pending",
            TaskStatus::Acknowledged => "acknowledged",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::BacklogAcknowledged => "backlog_acknowledged",
            TaskStatus::PendingUserReview => "pending_user_review",
            TaskStatus::Completed => "completed",
            TaskStatus::Closed => "closed",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Closed)
    }

    /// Statuses an agent of the assigned role can see and act on
    pub fn is_visible_to_agent(self) -> bool {
        matches!(
            self,
            TaskStatus::Pending
                | TaskStatus::Acknowledged
                | TaskStatus::BacklogAcknowledged
                | TaskStatus::InProgress
        )
    }

    /// Statuses that hand the task to a role and therefore need an assignee
    pub fn requires_assignee(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::BacklogAcknowledged)
    }

    /// Statuses only the assigned role (or the user) may move a task out of
    pub fn is_owned(self) -> bool {
        self.is_visible_to_agent()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = huddle_foundation::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| huddle_foundation::Error::InvalidInput(format!("Unknown status: {}", s)))
    }
}

// ============================================================================
// Transition graphs
// ============================================================================

/// Status a freshly created task starts in
pub fn initial_status(origin: TaskOrigin) -> TaskStatus {
    match origin {
        TaskOrigin::Chat => TaskStatus::Queued,
        TaskOrigin::Backlog => TaskStatus::Backlog,
    }
}

/// Every status a task of `origin` may ever hold
pub fn statuses(origin: TaskOrigin) -> &'static [TaskStatus] {
    match origin {
        TaskOrigin::Chat => &[
            TaskStatus::Queued,
            TaskStatus::Pending,
            TaskStatus::Acknowledged,
            TaskStatus::InProgress,
            TaskStatus::Completed,
        ],
        TaskOrigin::Backlog => &[
            TaskStatus::Backlog,
            TaskStatus::BacklogAcknowledged,
            TaskStatus::InProgress,
            TaskStatus::PendingUserReview,
            TaskStatus::Completed,
            TaskStatus::Closed,
        ],
    }
}

/// Statuses directly reachable from `from` in the graph of `origin`
pub fn next_statuses(origin: TaskOrigin, from: TaskStatus) -> &'static [TaskStatus] {
    use TaskStatus::*;
    match (origin, from) {
        (TaskOrigin::Chat, Queued) => &[Pending],
        (TaskOrigin::Chat, Pending) => &[Acknowledged],
        (TaskOrigin::Chat, Acknowledged) => &[InProgress],
        (TaskOrigin::Chat, InProgress) => &[Completed],

        (TaskOrigin::Backlog, Backlog) => &[BacklogAcknowledged],
        (TaskOrigin::Backlog, BacklogAcknowledged) => &[InProgress],
        (TaskOrigin::Backlog, InProgress) => &[PendingUserReview],
        (TaskOrigin::Backlog, PendingUserReview) => &[Completed, Closed],

        _ => &[],
    }
}

pub fn can_transition(origin: TaskOrigin, from: TaskStatus, to: TaskStatus) -> bool {
    next_statuses(origin, from).contains(&to)
}

/// Reject anything that is not a single edge of the origin's graph.
///
/// Same-status requests are rejected too; terminal statuses have no edges.
pub fn check_transition(origin: TaskOrigin, from: TaskStatus, to: TaskStatus) -> Result<()> {
    if can_transition(origin, from, to) {
        Ok(())
    } else {
        Err(TaskError::IllegalTransition { from, to, origin })
    }
}

/// Taking exclusive ownership of an actionable task
pub fn is_claim(from: TaskStatus, to: TaskStatus) -> bool {
    matches!(
        (from, to),
        (TaskStatus::Pending, TaskStatus::Acknowledged)
            | (TaskStatus::BacklogAcknowledged, TaskStatus::InProgress)
    )
}
