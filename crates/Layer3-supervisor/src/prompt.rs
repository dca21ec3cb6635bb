//! Prompt assembly seam
//!
//! The supervisor never looks inside a prompt. It asks a [`PromptProvider`]
//! for the text and hands it to the driver untouched.

use async_trait::async_trait;
use huddle_foundation::{ChatroomId, Role};
use huddle_task::Task;

/// What a provider knows about the agent being started
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub chatroom_id: ChatroomId,
    pub role: Role,
    pub team_roles: Vec<Role>,
    /// The task that made the role actionable, if any
    pub task: Option<Task>,
}

/// Opaque text for the driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub role_prompt: String,
    pub initial_message: String,
}

#[async_trait]
pub trait PromptProvider: Send + Sync {
    async fn build(&self, context: &PromptContext) -> Prompt;
}

/// Plain-text prompts from the role, the team and the task content
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicPromptProvider;

#[async_trait]
impl PromptProvider for BasicPromptProvider {
    async fn build(&self, context: &PromptContext) -> Prompt {
        let team = context
            .team_roles
            .iter()
            .filter(|r| **r != context.role)
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut role_prompt = format!(
            "You are the {} in chatroom {}.",
            context.role, context.chatroom_id
        );
        if !team.is_empty() {
            role_prompt.push_str(&format!(" Your teammates: {}.", team));
        }

        let initial_message = match &context.task {
            Some(task) => format!(
                "Task {} ({}, {}):\n{}",
                task.id.short(),
                task.origin,
                task.status,
                task.content
            ),
            None => "Wait for instructions.".to_string(),
        };

        Prompt {
            role_prompt,
            initial_message,
        }
    }
}
