//! In-memory task store

use super::{CasOutcome, TaskFilter, TaskStore};
use crate::error::{Result, TaskError};
use crate::state::TaskStatus;
use crate::task::{Task, TaskId};
use chrono::Utc;
use huddle_foundation::Role;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    revision: u64,
}

/// Task store backed by a `HashMap`; CAS runs under the write lock
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: RwLock<Inner>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn insert(&self, task: &Task) -> Result<Task> {
        let mut inner = self.inner.write();
        if inner.tasks.contains_key(&task.id) {
            return Err(huddle_foundation::Error::InvalidInput(format!(
                "Task {} already exists",
                task.id
            ))
            .into());
        }
        inner.revision += 1;
        let mut stored = task.clone();
        stored.revision = inner.revision;
        inner.tasks.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn read_task(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.inner.read().tasks.get(&id).cloned())
    }

    fn compare_and_swap_status(
        &self,
        id: TaskId,
        expected: TaskStatus,
        new: TaskStatus,
        assigned_role: Option<Role>,
    ) -> Result<CasOutcome> {
        let mut inner = self.inner.write();
        let next_revision = inner.revision + 1;

        let task = inner.tasks.get_mut(&id).ok_or(TaskError::TaskNotFound(id))?;
        if task.status != expected {
            return Ok(CasOutcome::Conflict {
                current: task.status,
            });
        }

        task.status = new;
        if assigned_role.is_some() {
            task.assigned_role = assigned_role;
        }
        task.updated_at = Utc::now();
        task.revision = next_revision;
        let updated = task.clone();

        inner.revision = next_revision;
        Ok(CasOutcome::Swapped(updated))
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let inner = self.inner.read();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.revision.cmp(&b.revision)));
        Ok(tasks)
    }

    fn changed_since(&self, revision: u64) -> Result<Vec<Task>> {
        let inner = self.inner.read();
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.revision > revision)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.revision);
        Ok(tasks)
    }
}
