//! Task signals to agent processes
//!
//! Each [`Dispatcher::tick`] reads tasks changed since the previous tick and
//! makes sure the role that can act on them has a running agent. Agent exits
//! never feed back into task status.

use crate::error::Result;
use crate::process::{SpawnOutcome, SpawnRequest};
use crate::prompt::{PromptContext, PromptProvider};
use crate::supervisor::Supervisor;
use huddle_foundation::{ChatroomId, HuddleConfig, Role};
use huddle_task::{
    Task, TaskFilter, TaskId, TaskLifecycle, TaskOrigin, TaskStatus, TransitionSignal,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one tick did
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Queued chat tasks moved to `pending`
    pub promoted: Vec<TaskId>,
    /// Agents started this tick
    pub spawned: Vec<(ChatroomId, Role, u32)>,
    /// Per-task failures; they do not abort the tick
    pub failures: Vec<(TaskId, String)>,
}

impl DispatchOutcome {
    pub fn is_idle(&self) -> bool {
        self.promoted.is_empty() && self.spawned.is_empty() && self.failures.is_empty()
    }
}

pub struct Dispatcher {
    lifecycle: TaskLifecycle,
    supervisor: Arc<Supervisor>,
    prompts: Arc<dyn PromptProvider>,
    config: Arc<HuddleConfig>,
    /// Highest task revision already handled
    cursor: u64,
}

impl Dispatcher {
    pub fn new(
        lifecycle: TaskLifecycle,
        supervisor: Arc<Supervisor>,
        prompts: Arc<dyn PromptProvider>,
        config: Arc<HuddleConfig>,
    ) -> Self {
        Self {
            lifecycle,
            supervisor,
            prompts,
            config,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn lifecycle(&self) -> &TaskLifecycle {
        &self.lifecycle
    }

    pub async fn tick(&mut self) -> Result<DispatchOutcome> {
        let mut outcome = DispatchOutcome::default();

        self.promote_queued(&mut outcome)?;

        let changed = self.lifecycle.store().changed_since(self.cursor)?;
        let mut handled = BTreeSet::new();
        for task in changed {
            self.cursor = self.cursor.max(task.revision);

            let TransitionSignal::Actionable {
                task_id,
                chatroom_id,
                role,
            } = TransitionSignal::for_task(&task)
            else {
                continue;
            };
            if !role.is_agent() || !handled.insert((chatroom_id.clone(), role)) {
                continue;
            }

            match self.ensure_agent(&chatroom_id, role, &task).await {
                Ok(SpawnOutcome::Started { pid }) => {
                    outcome.spawned.push((chatroom_id, role, pid));
                }
                Ok(SpawnOutcome::AlreadyRunning { pid }) => {
                    debug!(pid, task = %task_id, role = %role, "Agent already on it");
                }
                Err(e) => {
                    warn!(task = %task_id, role = %role, chatroom = %chatroom_id, "Dispatch failed: {}", e);
                    outcome.failures.push((task_id, e.to_string()));
                }
            }
        }

        if !outcome.is_idle() {
            info!(
                promoted = outcome.promoted.len(),
                spawned = outcome.spawned.len(),
                failed = outcome.failures.len(),
                "Dispatch tick"
            );
        }
        Ok(outcome)
    }

    /// FIFO: hand the oldest queued chat task of each idle chatroom to the
    /// first configured agent role
    fn promote_queued(&self, outcome: &mut DispatchOutcome) -> Result<()> {
        let Some(role) = self.config.team_roles().into_iter().find(|r| r.is_agent()) else {
            return Ok(());
        };

        let queued = self.lifecycle.store().list(
            &TaskFilter::new()
                .origin(TaskOrigin::Chat)
                .status(TaskStatus::Queued),
        )?;
        let chatrooms: BTreeSet<ChatroomId> = queued.into_iter().map(|t| t.chatroom_id).collect();

        for chatroom_id in chatrooms {
            match self.lifecycle.promote_next(&chatroom_id, role) {
                Ok(Some(transition)) => outcome.promoted.push(transition.task.id),
                Ok(None) => {}
                Err(e) => warn!(chatroom = %chatroom_id, "Promotion failed: {}", e),
            }
        }
        Ok(())
    }

    async fn ensure_agent(
        &self,
        chatroom_id: &ChatroomId,
        role: Role,
        task: &Task,
    ) -> Result<SpawnOutcome> {
        let assignment = self.config.role_assignment(role);
        let context = PromptContext {
            chatroom_id: chatroom_id.clone(),
            role,
            team_roles: self.config.team_roles(),
            task: Some(task.clone()),
        };
        let prompt = self.prompts.build(&context).await;

        let request = SpawnRequest::new(chatroom_id.clone(), role, assignment.tool)
            .with_model(assignment.model)
            .with_prompt(prompt.role_prompt)
            .with_message(prompt.initial_message);
        self.supervisor.spawn(request).await
    }
}
