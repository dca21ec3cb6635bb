//! OpenCode driver
//!
//! Server-backed agent started through `opencode run`. The role prompt is
//! handed over in the environment, the first message as the last argument.

use super::launch::{self, Invocation};
use crate::capabilities::AgentCapabilities;
use crate::error::Result;
use crate::r#trait::{CommandSpec, ProcessHandle, StartOptions, ToolDriver};
use async_trait::async_trait;
use huddle_foundation::ToolOverride;

const DEFAULT_PROGRAM: &str = "opencode";

/// Environment variable carrying the role prompt
pub const ENV_ROLE_PROMPT: &str = "HUDDLE_ROLE_PROMPT";

pub struct OpenCodeDriver {
    command: CommandSpec,
}

impl OpenCodeDriver {
    pub const ID: &'static str = "opencode";

    pub const CAPABILITIES: AgentCapabilities = AgentCapabilities::none()
        .with_session_persistence()
        .with_model_selection()
        .with_compaction()
        .with_event_streaming()
        .with_dynamic_model_discovery();

    pub fn new(over: &ToolOverride) -> Self {
        Self {
            command: CommandSpec::resolve(DEFAULT_PROGRAM, over),
        }
    }

    pub fn invocation(&self, options: &StartOptions) -> Invocation {
        let mut args = vec!["run".to_string()];
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push(options.initial_message.clone());

        Invocation {
            args,
            env: vec![(ENV_ROLE_PROMPT.to_string(), options.role_prompt.clone())],
            stdin_payload: None,
            keep_stdin: false,
        }
    }
}

impl Default for OpenCodeDriver {
    fn default() -> Self {
        Self::new(&ToolOverride::default())
    }
}

#[async_trait]
impl ToolDriver for OpenCodeDriver {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn display_name(&self) -> &'static str {
        "OpenCode"
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
        launch::list_models(Self::ID, Self::CAPABILITIES, &self.command, &["models"], &[]).await
    }
}
