//! Driver error types

use crate::capabilities::Capability;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum DriverError {
    /// The agent executable could not be launched
    #[error("Failed to spawn {tool}: {reason}")]
    Spawn { tool: String, reason: String },

    /// Rejected before touching any process
    #[error("{tool} does not support {capability}")]
    UnsupportedCapability { tool: String, capability: Capability },

    /// No driver registered under this id
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Model discovery failed for {tool}: {reason}")]
    ModelDiscovery { tool: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub fn spawn(tool: impl Into<String>, reason: impl ToString) -> Self {
        DriverError::Spawn {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    pub fn discovery(tool: impl Into<String>, reason: impl ToString) -> Self {
        DriverError::ModelDiscovery {
            tool: tool.into(),
            reason: reason.to_string(),
        }
    }

    /// Discovery can time out on a cold start; nothing else clears by itself
    pub fn is_retryable(&self) -> bool {
        matches!(self, DriverError::ModelDiscovery { .. })
    }
}
