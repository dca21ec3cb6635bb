//! Config - unified settings
//!
//! - `huddle.rs` - `HuddleConfig`, per-tool overrides and team assignments

mod huddle;

pub use huddle::{
    HuddleConfig, RoleAssignment, ToolOverride, DATA_DIR_ENV, DEFAULT_TOOL, HUDDLE_CONFIG_FILE,
};
