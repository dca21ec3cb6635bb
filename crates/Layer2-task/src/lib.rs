//! # huddle-task
//!
//! Task lifecycle for huddle chatrooms.
//!
//! ## Features
//!
//! - Closed status set with two origin-specific transition graphs (`state`)
//! - Compare-and-swap task stores: in-memory and SQLite (`store`)
//! - Role-checked transitions, exactly-once claims, FIFO promotion (`lifecycle`)
//!
//! Nothing in this crate spawns processes. Callers react to the
//! [`TransitionSignal`] a transition returns.

pub mod error;
pub mod lifecycle;
pub mod state;
pub mod store;
pub mod task;

pub use error::{Result, TaskError};
pub use lifecycle::{TaskLifecycle, Transition, TransitionSignal};
pub use state::{
    can_transition, check_transition, initial_status, is_claim, next_statuses, statuses,
    TaskStatus,
};
pub use store::{CasOutcome, InMemoryTaskStore, SqliteTaskStore, TaskFilter, TaskStore, TASK_DB_FILE};
pub use task::{Task, TaskId, TaskOrigin};
