//! Driver trait and common types

use crate::capabilities::{AgentCapabilities, Capability};
use crate::error::Result;
use async_trait::async_trait;
use huddle_foundation::{ChatroomId, Role, ToolOverride};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, ChildStdin};

/// Upper bound for writing a prompt to an agent's stdin at start
pub const STDIN_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a driver needs to start one agent
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub chatroom_id: ChatroomId,
    pub role: Role,
    /// Opaque prompt text; passed through untouched
    pub role_prompt: String,
    pub initial_message: String,
    pub model: Option<String>,
    /// stdout/stderr destination; discarded when unset
    pub log_path: Option<PathBuf>,
    pub workdir: Option<PathBuf>,
    /// A tool that has not drained its prompt by then fails to start
    pub stdin_timeout: Duration,
}

impl StartOptions {
    pub fn new(chatroom_id: ChatroomId, role: Role) -> Self {
        Self {
            chatroom_id,
            role,
            role_prompt: String::new(),
            initial_message: String::new(),
            model: None,
            log_path: None,
            workdir: None,
            stdin_timeout: STDIN_WRITE_TIMEOUT,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.role_prompt = prompt.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.initial_message = message.into();
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_stdin_timeout(mut self, timeout: Duration) -> Self {
        self.stdin_timeout = timeout;
        self
    }
}

/// A launched agent process.
///
/// The process leads its own process group (pgid == pid) and is not killed
/// when the handle is dropped.
#[derive(Debug)]
pub struct ProcessHandle {
    pub pid: u32,
    pub tool: String,
    pub child: Child,
    /// Open only for drivers that take messages after start
    pub stdin: Option<ChildStdin>,
}

/// Resolved executable plus user overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub extra_args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// `default_program` unless the override names another executable
    pub fn resolve(default_program: &str, over: &ToolOverride) -> Self {
        Self {
            program: over
                .command
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_program)),
            extra_args: over.extra_args.clone(),
            env: over.env.clone(),
        }
    }

    /// Found on `PATH` (or at the given path)
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }
}

/// One external agent tool integration
#[async_trait]
pub trait ToolDriver: Send + Sync {
    /// Registry key (e.g. "claude")
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn capabilities(&self) -> AgentCapabilities;

    fn command(&self) -> &CommandSpec;

    /// Spawn the agent; returns once the OS has launched the process image
    async fn start(&self, options: StartOptions) -> Result<ProcessHandle>;

    /// Static list without discovery; otherwise asks the tool, bounded in time
    async fn list_models(&self) -> Result<Vec<String>>;

    fn is_available(&self) -> bool {
        self.command().is_available()
    }

    /// Fail fast when `capability` is not declared
    fn require(&self, capability: Capability) -> Result<()> {
        self.capabilities().require(self.id(), capability)
    }
}
