//! Pi driver
//!
//! Interactive CLI reading from stdin. The role prompt and first message are
//! written as the opening input and the pipe stays open, so later messages
//! can be injected.

use super::launch::{self, Invocation};
use crate::capabilities::AgentCapabilities;
use crate::error::Result;
use crate::r#trait::{CommandSpec, ProcessHandle, StartOptions, ToolDriver};
use async_trait::async_trait;
use huddle_foundation::ToolOverride;

const DEFAULT_PROGRAM: &str = "pi";

pub struct PiDriver {
    command: CommandSpec,
}

impl PiDriver {
    pub const ID: &'static str = "pi";

    pub const CAPABILITIES: AgentCapabilities = AgentCapabilities::none()
        .with_session_persistence()
        .with_abort()
        .with_model_selection()
        .with_message_injection()
        .with_dynamic_model_discovery();

    pub fn new(over: &ToolOverride) -> Self {
        Self {
            command: CommandSpec::resolve(DEFAULT_PROGRAM, over),
        }
    }

    pub fn invocation(&self, options: &StartOptions) -> Invocation {
        let mut args = Vec::new();
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        let mut payload = String::new();
        if !options.role_prompt.is_empty() {
            payload.push_str(&options.role_prompt);
            payload.push_str("\n\n");
        }
        payload.push_str(&options.initial_message);
        payload.push('\n');

        Invocation {
            args,
            env: Vec::new(),
            stdin_payload: Some(payload),
            keep_stdin: true,
        }
    }
}

impl Default for PiDriver {
    fn default() -> Self {
        Self::new(&ToolOverride::default())
    }
}

#[async_trait]
impl ToolDriver for PiDriver {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn display_name(&self) -> &'static str {
        "Pi"
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
        launch::list_models(
            Self::ID,
            Self::CAPABILITIES,
            &self.command,
            &["--list-models"],
            &[],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_foundation::{ChatroomId, Role};

    #[test]
    fn test_prompt_written_to_stdin() {
        let options = StartOptions::new(ChatroomId::new("room"), Role::Builder)
            .with_prompt("You build.")
            .with_message("Start with the parser.");
        let inv = PiDriver::default().invocation(&options);

        assert!(inv.args.is_empty());
        assert_eq!(
            inv.stdin_payload.as_deref(),
            Some("You build.\n\nStart with the parser.\n")
        );
        assert!(inv.keep_stdin);
    }
}
