//! Claude Code driver
//!
//! Headless single-shot CLI: the role prompt rides on
//! `--append-system-prompt`, the first message on `-p`, and progress comes
//! back as stream-json on stdout.

use super::launch::{self, Invocation};
use crate::capabilities::AgentCapabilities;
use crate::error::Result;
use crate::r#trait::{CommandSpec, ProcessHandle, StartOptions, ToolDriver};
use async_trait::async_trait;
use huddle_foundation::ToolOverride;

const DEFAULT_PROGRAM: &str = "claude";

/// Model aliases the CLI accepts
const STATIC_MODELS: &[&str] = &["opus", "sonnet", "haiku"];

pub struct ClaudeDriver {
    command: CommandSpec,
}

impl ClaudeDriver {
    pub const ID: &'static str = "claude";

    pub const CAPABILITIES: AgentCapabilities = AgentCapabilities::none()
        .with_session_persistence()
        .with_abort()
        .with_model_selection()
        .with_compaction()
        .with_event_streaming();

    pub fn new(over: &ToolOverride) -> Self {
        Self {
            command: CommandSpec::resolve(DEFAULT_PROGRAM, over),
        }
    }

    pub fn invocation(&self, options: &StartOptions) -> Invocation {
        let mut args = vec![
            "-p".to_string(),
            options.initial_message.clone(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];
        if !options.role_prompt.is_empty() {
            args.push("--append-system-prompt".to_string());
            args.push(options.role_prompt.clone());
        }
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        Invocation {
            args,
            ..Default::default()
        }
    }
}

impl Default for ClaudeDriver {
    fn default() -> Self {
        Self::new(&ToolOverride::default())
    }
}

#[async_trait]
impl ToolDriver for ClaudeDriver {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn display_name(&self) -> &'static str {
        "Claude Code"
    }

    fn capabilities(&self) -> AgentCapabilities {
        Self::CAPABILITIES
    }

    fn command(&self) -> &CommandSpec {
        &self.command
    }

    async fn start(&self, options: StartOptions) -> Result<ProcessHandle> {
        launch::check_model(Self::ID, Self::CAPABILITIES, &options)?;
        let invocation = self.invocation(&options);
        launch::launch(Self::ID, &self.command, invocation, &options).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        launch::list_models(Self::ID, Self::CAPABILITIES, &self.command, &[], STATIC_MODELS).await
    }
}
