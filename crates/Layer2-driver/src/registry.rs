//! Driver Registry - tool id to driver
//!
//! Built once from config at startup; there is no registration at runtime.
//! Tests get isolation by building a fresh registry.

use crate::capabilities::AgentCapabilities;
use crate::drivers::{AgentDriver, TOOL_IDS};
use crate::error::{DriverError, Result};
use crate::r#trait::ToolDriver;
use huddle_foundation::HuddleConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct DriverRegistry {
    drivers: BTreeMap<&'static str, Arc<AgentDriver>>,
}

impl DriverRegistry {
    /// Every known driver, with overrides from `config`
    pub fn from_config(config: &HuddleConfig) -> Result<Self> {
        let mut drivers = BTreeMap::new();
        for id in TOOL_IDS {
            let driver = AgentDriver::from_config(id, config)?;
            debug!(tool = id, program = %driver.command().program.display(), "Registered driver");
            drivers.insert(id, Arc::new(driver));
        }
        Ok(Self { drivers })
    }

    /// Registry with default invocations
    pub fn with_defaults() -> Self {
        let drivers = [
            AgentDriver::Claude(Default::default()),
            AgentDriver::Pi(Default::default()),
            AgentDriver::OpenCode(Default::default()),
        ]
        .into_iter()
        .map(|d| (d.id(), Arc::new(d)))
        .collect();
        Self { drivers }
    }

    /// Driver for `tool`; never falls back to another tool
    pub fn get(&self, tool: &str) -> Result<Arc<AgentDriver>> {
        self.drivers
            .get(tool)
            .cloned()
            .ok_or_else(|| DriverError::UnknownTool(tool.to_string()))
    }

    pub fn all(&self) -> Vec<Arc<AgentDriver>> {
        TOOL_IDS
            .iter()
            .filter_map(|id| self.drivers.get(id).cloned())
            .collect()
    }

    pub fn capabilities(&self, tool: &str) -> Result<AgentCapabilities> {
        Ok(self.get(tool)?.capabilities())
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.drivers.contains_key(tool)
    }
}
