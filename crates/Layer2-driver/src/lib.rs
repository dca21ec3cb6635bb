//! # huddle-driver
//!
//! Agent tool drivers for huddle.
//!
//! ## Features
//! - Static capability declaration per tool (`AgentCapabilities`)
//! - Tool-specific spawn conventions: prompt by flag, by stdin or by environment
//! - Static or discovered model lists
//! - `DriverRegistry` built once from `HuddleConfig`

pub mod capabilities;
pub mod drivers;
pub mod error;
pub mod registry;
pub mod r#trait;

pub use capabilities::{AgentCapabilities, Capability};
pub use drivers::{
    claude::ClaudeDriver, launch::parse_model_list, opencode::OpenCodeDriver, pi::PiDriver,
    AgentDriver, TOOL_IDS,
};
pub use error::{DriverError, Result};
pub use r#trait::{CommandSpec, ProcessHandle, StartOptions, ToolDriver, STDIN_WRITE_TIMEOUT};
pub use registry::DriverRegistry;
