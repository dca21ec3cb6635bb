//! Task stores
//!
//! The store is the authority on task status. Status changes go through
//! [`TaskStore::compare_and_swap_status`] only, so two claimants racing on
//! the same task can never both win.
//!
//! - `memory.rs` - `InMemoryTaskStore` (tests, single-process use)
//! - `sqlite.rs` - `SqliteTaskStore` (shared between CLI and daemon)

mod memory;
mod sqlite;

pub use memory::InMemoryTaskStore;
pub use sqlite::{SqliteTaskStore, TASK_DB_FILE};

use crate::error::Result;
use crate::state::TaskStatus;
use crate::task::{Task, TaskId, TaskOrigin};
use huddle_foundation::{ChatroomId, Role};

/// Result of a compare-and-swap
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// Status matched and was replaced; carries the updated task
    Swapped(Task),
    /// Status had already moved on
    Conflict { current: TaskStatus },
}

/// Listing filter; empty matches everything
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub chatroom_id: Option<ChatroomId>,
    pub origin: Option<TaskOrigin>,
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chatroom(mut self, chatroom_id: ChatroomId) -> Self {
        self.chatroom_id = Some(chatroom_id);
        self
    }

    pub fn origin(mut self, origin: TaskOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.chatroom_id
            .as_ref()
            .map_or(true, |c| *c == task.chatroom_id)
            && self.origin.map_or(true, |o| o == task.origin)
            && self.status.map_or(true, |s| s == task.status)
    }
}

/// Authoritative task storage
pub trait TaskStore: Send + Sync {
    /// Store a new task; assigns its revision
    fn insert(&self, task: &Task) -> Result<Task>;

    fn read_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// Atomically move `id` from `expected` to `new`.
    ///
    /// `assigned_role` replaces the assignee when `Some`; `None` keeps it.
    /// `updated_at` and the revision are refreshed on success.
    fn compare_and_swap_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        new: TaskStatus,
        assigned_role: Option<Role>,
    ) -> Result<CasOutcome>;

    /// Matching tasks, oldest first
    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Tasks whose revision is greater than `revision`, in revision order
    fn changed_since(&self, revision: u64) -> Result<Vec<Task>>;
}
