//! Task definition and types

use crate::state::{initial_status, TaskStatus};
use chrono::{DateTime, Utc};
use huddle_foundation::{ChatroomId, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex digits, for listings
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = huddle_foundation::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(TaskId)
            .map_err(|e| huddle_foundation::Error::InvalidInput(format!("Invalid task id: {}", e)))
    }
}

/// How a task entered the system; fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    /// Live conversation
    Chat,
    /// Pre-staged backlog item
    Backlog,
}

impl TaskOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskOrigin::Chat => "chat",
            TaskOrigin::Backlog => "backlog",
        }
    }
}

impl fmt::Display for TaskOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskOrigin {
    type Err = huddle_foundation::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(TaskOrigin::Chat),
            "backlog" => Ok(TaskOrigin::Backlog),
            other => Err(huddle_foundation::Error::InvalidInput(format!(
                "Unknown origin: {}",
                other
            ))),
        }
    }
}

/// A unit of work inside a chatroom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    /// Owning session; status logic is scoped per chatroom
    pub chatroom_id: ChatroomId,

    pub origin: TaskOrigin,

    /// Mutated only through validated transitions
    pub status: TaskStatus,

    /// Role currently authorized to act
    pub assigned_role: Option<Role>,

    /// Free-form task text
    pub content: String,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every transition
    pub updated_at: DateTime<Utc>,

    /// Store-wide change counter; grows on insert and every transition
    pub revision: u64,
}

impl Task {
    /// Create a new task in its origin's initial status
    pub fn new(chatroom_id: ChatroomId, origin: TaskOrigin, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            chatroom_id,
            origin,
            status: initial_status(origin),
            assigned_role: None,
            content: content.into(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
