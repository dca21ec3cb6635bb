//! # huddle-foundation
//!
//! Foundation layer for huddle:
//! - Core: `Role`, `ChatroomId`
//! - Config: `HuddleConfig` (global + project JSON, merged)
//! - Storage: SQLite `ProcessRecordStore`, `JsonStore`
//! - Signal: liveness probe and SIGTERM/SIGKILL delivery
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  Layer4-cli        huddle daemon/task/tools               │
//! │                     │                                     │
//! │  Layer3-supervisor  Supervisor ◄── Dispatcher             │
//! │                     │        │                            │
//! │  Layer2-driver      DriverRegistry   Layer2-task          │
//! │                     (claude/pi/...)  TaskLifecycle/Store  │
//! │                     │                │                    │
//! │  Layer1-foundation  Error, Config, ProcessRecordStore     │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod signal;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Core
// ============================================================================
pub use core::{ChatroomId, Role};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    HuddleConfig, RoleAssignment, ToolOverride, DATA_DIR_ENV, DEFAULT_TOOL, HUDDLE_CONFIG_FILE,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{JsonStore, ProcessRecord, ProcessRecordStore, PROCESS_DB_FILE};

// ============================================================================
// Signal
// ============================================================================
pub use signal::{SignalOutcome, StopSignal};
