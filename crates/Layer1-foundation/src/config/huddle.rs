//! Huddle Config - unified settings
//!
//! Global (`<config_dir>/huddle/config.json`) and project
//! (`.huddle/config.json`) files are merged, project values winning.

use crate::core::Role;
use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Settings file name
pub const HUDDLE_CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "HUDDLE_DATA_DIR";

/// Driver used for a role nobody configured
pub const DEFAULT_TOOL: &str = "claude";

const DEFAULT_GRACE_PERIOD_MS: u64 = 1_000;
const DEFAULT_KILL_WAIT_MS: u64 = 2_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

// ============================================================================
// Huddle Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HuddleConfig {
    /// Version (for migrations)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Where the process database, pid file and logs live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Time between SIGTERM and SIGKILL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_ms: Option<u64>,

    /// How long to wait for exit after SIGKILL before giving up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_wait_ms: Option<u64>,

    /// Dispatcher poll interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Per-driver invocation overrides, keyed by tool id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, ToolOverride>,

    /// Which driver (and model) runs each role
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub team: BTreeMap<Role, RoleAssignment>,
}

/// Override how a driver's executable is launched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOverride {
    /// Executable path or name; the driver's default binary when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<PathBuf>,

    /// Arguments appended after the driver's own
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Extra environment for the agent process
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Driver selection for one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for RoleAssignment {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            model: None,
        }
    }
}

impl HuddleConfig {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            ..Default::default()
        }
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Global + project merged load
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<HuddleConfig>(HUDDLE_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<HuddleConfig>(HUDDLE_CONFIG_FILE)?
            {
                config.merge(project_config);
            }
        }

        Ok(config)
    }

    /// Overlay `other` on top of `self`
    pub fn merge(&mut self, other: HuddleConfig) {
        if other.version > self.version {
            self.version = other.version;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if other.grace_period_ms.is_some() {
            self.grace_period_ms = other.grace_period_ms;
        }
        if other.kill_wait_ms.is_some() {
            self.kill_wait_ms = other.kill_wait_ms;
        }
        if other.poll_interval_ms.is_some() {
            self.poll_interval_ms = other.poll_interval_ms;
        }
        self.tools.extend(other.tools);
        self.team.extend(other.team);
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn grace_period_ms(mut self, ms: u64) -> Self {
        self.grace_period_ms = Some(ms);
        self
    }

    pub fn kill_wait_ms(mut self, ms: u64) -> Self {
        self.kill_wait_ms = Some(ms);
        self
    }

    pub fn tool_override(mut self, tool: impl Into<String>, over: ToolOverride) -> Self {
        self.tools.insert(tool.into(), over);
        self
    }

    pub fn assign(mut self, role: Role, tool: impl Into<String>, model: Option<String>) -> Self {
        self.team.insert(
            role,
            RoleAssignment {
                tool: tool.into(),
                model,
            },
        );
        self
    }

    // ========================================================================
    // Effective values
    // ========================================================================

    /// `$HUDDLE_DATA_DIR`, then `dataDir`, then `<data_local_dir>/huddle`
    pub fn effective_data_dir(&self) -> PathBuf {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("huddle")
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms.unwrap_or(DEFAULT_GRACE_PERIOD_MS))
    }

    pub fn kill_wait(&self) -> Duration {
        Duration::from_millis(self.kill_wait_ms.unwrap_or(DEFAULT_KILL_WAIT_MS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn tool(&self, tool: &str) -> ToolOverride {
        self.tools.get(tool).cloned().unwrap_or_default()
    }

    pub fn role_assignment(&self, role: Role) -> RoleAssignment {
        self.team.get(&role).cloned().unwrap_or_default()
    }

    /// Agent roles on the team; every agent role when none is configured
    pub fn team_roles(&self) -> Vec<Role> {
        let configured: Vec<Role> = self.team.keys().copied().filter(|r| r.is_agent()).collect();
        if configured.is_empty() {
            Role::AGENTS.to_vec()
        } else {
            configured
        }
    }
}

fn default_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = HuddleConfig::new();
        assert_eq!(config.version, 1);
        assert_eq!(config.grace_period(), Duration::from_secs(1));
        assert_eq!(config.kill_wait(), Duration::from_secs(2));
        assert_eq!(config.role_assignment(Role::Builder).tool, DEFAULT_TOOL);
        assert_eq!(config.team_roles(), Role::AGENTS.to_vec());
    }

    #[test]
    fn test_config_merge_overlay_wins() {
        let mut base = HuddleConfig::new()
            .grace_period_ms(500)
            .assign(Role::Builder, "claude", None);
        let overlay = HuddleConfig::new()
            .grace_period_ms(250)
            .assign(Role::Builder, "pi", Some("gpt-5".to_string()));

        base.merge(overlay);

        assert_eq!(base.grace_period(), Duration::from_millis(250));
        assert_eq!(base.role_assignment(Role::Builder).tool, "pi");
        assert_eq!(
            base.role_assignment(Role::Builder).model.as_deref(),
            Some("gpt-5")
        );
    }

    #[test]
    fn test_config_merge_keeps_unset_fields() {
        let mut base = HuddleConfig::new().kill_wait_ms(900);
        base.merge(HuddleConfig::new());
        assert_eq!(base.kill_wait(), Duration::from_millis(900));
    }

    #[test]
    fn test_config_json_shape() {
        let config = HuddleConfig::new()
            .grace_period_ms(1500)
            .assign(Role::Reviewer, "opencode", None)
            .tool_override(
                "opencode",
                ToolOverride {
                    command: Some(PathBuf::from("/opt/bin/opencode")),
                    ..Default::default()
                },
            );

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["gracePeriodMs"], 1500);
        assert_eq!(json["team"]["reviewer"]["tool"], "opencode");
        assert_eq!(json["tools"]["opencode"]["command"], "/opt/bin/opencode");

        let back: HuddleConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_team_roles_skip_user() {
        let config = HuddleConfig::new()
            .assign(Role::User, "claude", None)
            .assign(Role::Planner, "claude", None);
        assert_eq!(config.team_roles(), vec![Role::Planner]);
    }
}
