//! Task lifecycle
//!
//! Validated status changes on top of a [`TaskStore`]. Every change is
//! read, checked against the origin graph and the actor's authority, then
//! written with a compare-and-swap against the status that was read.

use crate::error::{Result, TaskError};
use crate::state::{check_transition, statuses, TaskStatus};
use crate::store::{CasOutcome, TaskFilter, TaskStore};
use crate::task::{Task, TaskId, TaskOrigin};
use huddle_foundation::{ChatroomId, Role};
use std::sync::Arc;
use tracing::{debug, info};

/// What the rest of the system should do after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionSignal {
    /// `role` now has something to work on in `chatroom_id`
    Actionable {
        task_id: TaskId,
        chatroom_id: ChatroomId,
        role: Role,
    },
    /// Task reached a terminal status
    Finished {
        task_id: TaskId,
        chatroom_id: ChatroomId,
    },
    None,
}

impl TransitionSignal {
    /// Signal implied by a task's current status
    pub fn for_task(task: &Task) -> Self {
        if task.status.is_terminal() {
            return TransitionSignal::Finished {
                task_id: task.id,
                chatroom_id: task.chatroom_id.clone(),
            };
        }
        match (task.status.is_visible_to_agent(), task.assigned_role) {
            (true, Some(role)) => TransitionSignal::Actionable {
                task_id: task.id,
                chatroom_id: task.chatroom_id.clone(),
                role,
            },
            _ => TransitionSignal::None,
        }
    }
}

/// A successful transition
#[derive(Debug, Clone)]
pub struct Transition {
    pub from: TaskStatus,
    pub task: Task,
    pub signal: TransitionSignal,
}

pub struct TaskLifecycle {
    store: Arc<dyn TaskStore>,
}

impl TaskLifecycle {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Create a task in its origin's initial status, unassigned
    pub fn create(
        &self,
        chatroom_id: ChatroomId,
        origin: TaskOrigin,
        content: impl Into<String>,
    ) -> Result<Task> {
        let task = self.store.insert(&Task::new(chatroom_id, origin, content))?;
        info!(
            task = %task.id,
            chatroom = %task.chatroom_id,
            origin = %task.origin,
            "Task created in {}",
            task.status
        );
        Ok(task)
    }

    pub fn get(&self, id: TaskId) -> Result<Task> {
        self.store.read_task(id)?.ok_or(TaskError::TaskNotFound(id))
    }

    /// Move `id` to `to` on behalf of `actor`.
    ///
    /// `assign` is only meaningful when entering `pending` or
    /// `backlog_acknowledged`; the current assignee is kept when it is `None`.
    pub fn transition(
        &self,
        id: TaskId,
        to: TaskStatus,
        actor: Role,
        assign: Option<Role>,
    ) -> Result<Transition> {
        let task = self.get(id)?;
        let from = task.status;

        check_transition(task.origin, from, to)?;
        authorize(&task, actor)?;

        let assign = if to.requires_assignee() {
            let assignee = assign
                .or(task.assigned_role)
                .ok_or(TaskError::MissingAssignee { to })?;
            Some(assignee)
        } else {
            if let Some(requested) = assign {
                if task.assigned_role != Some(requested) {
                    return Err(huddle_foundation::Error::InvalidInput(format!(
                        "Task {} can only be reassigned when moving to pending or backlog_acknowledged",
                        id
                    ))
                    .into());
                }
            }
            None
        };

        match self.store.compare_and_swap_status(id, from, to, assign)? {
            CasOutcome::Swapped(task) => {
                let signal = TransitionSignal::for_task(&task);
                info!(
                    task = %task.id,
                    chatroom = %task.chatroom_id,
                    actor = %actor,
                    "Task {} -> {}",
                    from,
                    to
                );
                Ok(Transition { from, task, signal })
            }
            CasOutcome::Conflict { current } => {
                debug!(task = %id, expected = %from, current = %current, "Transition lost race");
                Err(TaskError::ClaimConflict {
                    task_id: id,
                    expected: from,
                })
            }
        }
    }

    /// Claim an actionable task for `actor`.
    ///
    /// Chat tasks go `pending → acknowledged`; backlog tasks go
    /// `backlog_acknowledged → in_progress`. Exactly one of several racing
    /// claimants succeeds; the rest see `ClaimConflict`, including those
    /// that only read the task after the winner already moved it.
    pub fn claim(&self, id: TaskId, actor: Role) -> Result<Transition> {
        let task = self.get(id)?;
        let (claimable, to) = match task.origin {
            TaskOrigin::Chat => (TaskStatus::Pending, TaskStatus::Acknowledged),
            TaskOrigin::Backlog => (TaskStatus::BacklogAcknowledged, TaskStatus::InProgress),
        };

        if task.status.is_terminal() {
            return Err(TaskError::IllegalTransition {
                from: task.status,
                to,
                origin: task.origin,
            });
        }

        let order = statuses(task.origin);
        let position = |s: TaskStatus| order.iter().position(|x| *x == s);
        if position(task.status) > position(claimable) {
            return Err(TaskError::ClaimConflict {
                task_id: id,
                expected: claimable,
            });
        }
        self.transition(id, to, actor, None)
    }

    /// Promote the oldest queued chat task of `chatroom_id` to `pending`
    /// for `role`, unless a chat task is already being worked on there.
    pub fn promote_next(&self, chatroom_id: &ChatroomId, role: Role) -> Result<Option<Transition>> {
        let tasks = self.store.list(
            &TaskFilter::new()
                .chatroom(chatroom_id.clone())
                .origin(TaskOrigin::Chat),
        )?;

        let busy = tasks.iter().any(|t| {
            matches!(
                t.status,
                TaskStatus::Pending | TaskStatus::Acknowledged | TaskStatus::InProgress
            )
        });
        if busy {
            return Ok(None);
        }

        let Some(next) = tasks.iter().find(|t| t.status == TaskStatus::Queued) else {
            return Ok(None);
        };

        match self.transition(next.id, TaskStatus::Pending, role, Some(role)) {
            Ok(transition) => Ok(Some(transition)),
            Err(TaskError::ClaimConflict { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Only the assignee (or the user) moves a task out of an owned status;
/// only the user closes out a review.
fn authorize(task: &Task, actor: Role) -> Result<()> {
    let from = task.status;
    let allowed = if from == TaskStatus::PendingUserReview {
        actor == Role::User
    } else if from.is_owned() {
        actor == Role::User || task.assigned_role == Some(actor)
    } else {
        true
    };

    if allowed {
        Ok(())
    } else {
        Err(TaskError::RoleNotAuthorized {
            role: actor,
            status: from,
        })
    }
}
