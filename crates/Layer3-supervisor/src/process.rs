//! Agent process records and operation outcomes

use chrono::{DateTime, Utc};
use huddle_foundation::{ChatroomId, Role};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

/// Lifecycle of one supervised agent process
///
/// `starting → running → {stopping → stopped | crashed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
}

impl AgentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Starting => "starting",
            AgentState::Running => "running",
            AgentState::Stopping => "stopping",
            AgentState::Stopped => "stopped",
            AgentState::Crashed => "crashed",
        }
    }

    /// A process exists (or is being created) for this entry
    pub fn is_live(self) -> bool {
        matches!(
            self,
            AgentState::Starting | AgentState::Running | AgentState::Stopping
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// Exit observed by liveness probing only
    pub fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(sig)) => write!(f, "signal {}", sig),
            (None, None) => f.write_str("unknown exit"),
        }
    }
}

/// One agent process owned by the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProcess {
    pub chatroom_id: ChatroomId,
    pub role: Role,
    pub tool: String,
    /// `None` before spawn and after reap
    pub pid: Option<u32>,
    pub state: AgentState,
    /// Taken over from a previous supervisor; not our child
    pub adopted: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub exit: Option<ExitInfo>,
}

impl AgentProcess {
    pub(crate) fn vacant(chatroom_id: ChatroomId, role: Role) -> Self {
        Self {
            chatroom_id,
            role,
            tool: String::new(),
            pid: None,
            state: AgentState::Stopped,
            adopted: false,
            started_at: None,
            exit: None,
        }
    }
}

/// Everything needed to start an agent for a role
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub chatroom_id: ChatroomId,
    pub role: Role,
    pub tool: String,
    pub model: Option<String>,
    pub role_prompt: String,
    pub initial_message: String,
    pub workdir: Option<PathBuf>,
}

impl SpawnRequest {
    pub fn new(chatroom_id: ChatroomId, role: Role, tool: impl Into<String>) -> Self {
        Self {
            chatroom_id,
            role,
            tool: tool.into(),
            model: None,
            role_prompt: String::new(),
            initial_message: String::new(),
            workdir: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.role_prompt = prompt.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.initial_message = message.into();
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Started { pid: u32 },
    /// An agent already runs for this chatroom and role
    AlreadyRunning { pid: u32 },
}

impl SpawnOutcome {
    pub fn pid(&self) -> u32 {
        match self {
            SpawnOutcome::Started { pid } | SpawnOutcome::AlreadyRunning { pid } => *pid,
        }
    }
}

/// How a stopped process went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Gone before any signal landed
    AlreadyExited,
    /// Exited within the grace period after SIGTERM
    Graceful,
    /// Needed SIGKILL
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { pid: u32, termination: Termination },
    /// Nothing to stop; not an error
    NotRunning,
}

impl StopOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, StopOutcome::NotRunning)
    }
}

/// Result of reconciling persisted records at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Live processes taken over by this supervisor
    pub adopted: Vec<(ChatroomId, Role, u32)>,
    /// Dead processes whose records were deleted
    pub removed: Vec<(ChatroomId, Role, u32)>,
    /// Live processes owned by another live supervisor
    pub foreign: Vec<(ChatroomId, Role, u32)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_liveness() {
        assert!(AgentState::Running.is_live());
        assert!(AgentState::Stopping.is_live());
        assert!(!AgentState::Stopped.is_live());
        assert!(!AgentState::Crashed.is_live());
    }

    #[test]
    fn test_exit_info_display() {
        let clean = ExitInfo {
            code: Some(0),
            signal: None,
        };
        assert!(clean.success());
        assert_eq!(clean.to_string(), "exit code 0");

        let killed = ExitInfo {
            code: None,
            signal: Some(9),
        };
        assert!(!killed.success());
        assert_eq!(killed.to_string(), "signal 9");
        assert_eq!(ExitInfo::unknown().to_string(), "unknown exit");
    }
}
