//! Agent capabilities
//!
//! What a tool integration can do, declared once per driver variant. Callers
//! check these before asking a driver for an optional operation.

use crate::error::{DriverError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static capability set of a driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Conversation can be resumed across restarts
    pub session_persistence: bool,
    /// Running work can be interrupted
    pub abort: bool,
    /// Accepts a model name at start
    pub model_selection: bool,
    /// Compacts its own context
    pub compaction: bool,
    /// Emits structured events on stdout
    pub event_streaming: bool,
    /// Accepts further messages on stdin after start
    pub message_injection: bool,
    /// Can list its models at runtime
    pub dynamic_model_discovery: bool,
}

impl AgentCapabilities {
    pub const fn none() -> Self {
        Self {
            session_persistence: false,
            abort: false,
            model_selection: false,
            compaction: false,
            event_streaming: false,
            message_injection: false,
            dynamic_model_discovery: false,
        }
    }

    pub const fn with_session_persistence(mut self) -> Self {
        self.session_persistence = true;
        self
    }

    pub const fn with_abort(mut self) -> Self {
        self.abort = true;
        self
    }

    pub const fn with_model_selection(mut self) -> Self {
        self.model_selection = true;
        self
    }

    pub const fn with_compaction(mut self) -> Self {
        self.compaction = true;
        self
    }

    pub const fn with_event_streaming(mut self) -> Self {
        self.event_streaming = true;
        self
    }

    pub const fn with_message_injection(mut self) -> Self {
        self.message_injection = true;
        self
    }

    pub const fn with_dynamic_model_discovery(mut self) -> Self {
        self.dynamic_model_discovery = true;
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::SessionPersistence => self.session_persistence,
            Capability::Abort => self.abort,
            Capability::ModelSelection => self.model_selection,
            Capability::Compaction => self.compaction,
            Capability::EventStreaming => self.event_streaming,
            Capability::MessageInjection => self.message_injection,
            Capability::DynamicModelDiscovery => self.dynamic_model_discovery,
        }
    }

    /// `UnsupportedCapability` unless `capability` is declared
    pub fn require(&self, tool: &str, capability: Capability) -> Result<()> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(DriverError::UnsupportedCapability {
                tool: tool.to_string(),
                capability,
            })
        }
    }

    /// Declared capabilities, in declaration order
    pub fn list(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.supports(*c))
            .collect()
    }
}

/// A single optional operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    SessionPersistence,
    Abort,
    ModelSelection,
    Compaction,
    EventStreaming,
    MessageInjection,
    DynamicModelDiscovery,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::SessionPersistence,
        Capability::Abort,
        Capability::ModelSelection,
        Capability::Compaction,
        Capability::EventStreaming,
        Capability::MessageInjection,
        Capability::DynamicModelDiscovery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::SessionPersistence => "sessionPersistence",
            Capability::Abort => "abort",
            Capability::ModelSelection => "modelSelection",
            Capability::Compaction => "compaction",
            Capability::EventStreaming => "eventStreaming",
            Capability::MessageInjection => "messageInjection",
            Capability::DynamicModelDiscovery => "dynamicModelDiscovery",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
