//! Shared identity types: roles and chatrooms

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Role
// ============================================================================

/// A participant function inside a chatroom
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Planner,
    Builder,
    Reviewer,
    /// The human operator
    User,
}

impl Role {
    /// Roles that are backed by an agent process
    pub const AGENTS: [Role; 3] = [Role::Planner, Role::Builder, Role::Reviewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Builder => "builder",
            Role::Reviewer => "reviewer",
            Role::User => "user",
        }
    }

    /// `false` for the human role, which never gets a process
    pub fn is_agent(self) -> bool {
        !matches!(self, Role::User)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planner" => Ok(Role::Planner),
            "builder" => Ok(Role::Builder),
            "reviewer" => Ok(Role::Reviewer),
            "user" => Ok(Role::User),
            other => Err(Error::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

// ============================================================================
// Chatroom
// ============================================================================

/// Identifier of one collaborative work session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatroomId(String);

impl ChatroomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatroomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChatroomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChatroomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
