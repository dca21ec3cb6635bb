//! Concrete driver variants
//!
//! The set is closed: [`AgentDriver`] has one variant per supported tool and
//! forwards every [`ToolDriver`] call to it.

pub mod claude;
pub mod launch;
pub mod opencode;
pub mod pi;

use crate::capabilities::AgentCapabilities;
use crate::error::{DriverError, Result};
use crate::r#trait::{CommandSpec, ProcessHandle, StartOptions, ToolDriver};
use async_trait::async_trait;
use claude::ClaudeDriver;
use huddle_foundation::HuddleConfig;
use opencode::OpenCodeDriver;
use pi::PiDriver;

/// Every tool id, in listing order
pub const TOOL_IDS: [&str; 3] = [ClaudeDriver::ID, PiDriver::ID, OpenCodeDriver::ID];

pub enum AgentDriver {
    Claude(ClaudeDriver),
    Pi(PiDriver),
    OpenCode(OpenCodeDriver),
}

impl AgentDriver {
    /// Build the variant for `tool` with its overrides from `config`
    pub fn from_config(tool: &str, config: &HuddleConfig) -> Result<Self> {
        let over = config.tool(tool);
        match tool {
            ClaudeDriver::ID => Ok(AgentDriver::Claude(ClaudeDriver::new(&over))),
            PiDriver::ID => Ok(AgentDriver::Pi(PiDriver::new(&over))),
            OpenCodeDriver::ID => Ok(AgentDriver::OpenCode(OpenCodeDriver::new(&over))),
            other => Err(DriverError::UnknownTool(other.to_string())),
        }
    }

    fn inner(&self) -> &dyn ToolDriver {
        match self {
            AgentDriver::Claude(d) => d,
            AgentDriver::Pi(d) => d,
            AgentDriver::OpenCode(d) => d,
        }
    }
}

#[async_trait]
impl ToolDriver for AgentDriver {
    fn id(&self) -> &'static str {
        self.inner().id()
    }

    fn display_name(&self) -> &'static str {
        self.inner().display_name()
    }

    fn capabilities(&self) -> AgentCapabilities {
        self.inner().capabilities()
    }

    fn command(&self) -> &CommandSpec {
        self.inner().command()
    }

    async fn start(&self, options: StartOptions) -> Result<ProcessHandle> {
        self.inner().start(options).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.inner().list_models().await
    }

    fn is_available(&self) -> bool {
        self.inner().is_available()
    }
}

impl std::fmt::Debug for AgentDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDriver")
            .field("id", &self.id())
            .field("program", &self.command().program)
            .finish()
    }
}
