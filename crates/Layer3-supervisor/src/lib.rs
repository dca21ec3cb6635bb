//! # huddle-supervisor
//!
//! Agent process supervision for huddle chatrooms.
//!
//! ## Features
//! - One agent process per `(chatroom, role)`, spawned through the driver registry
//! - SIGTERM, grace period, SIGKILL, bounded wait (`shutdown`)
//! - Crash detection and durable process records with reconciliation
//! - `Dispatcher`: actionable tasks start the assigned role's agent
//!
//! ```ignore
//! let context = HuddleContext::load()?;
//! let supervisor = Arc::new(context.supervisor()?);
//! supervisor.reconcile().await?;
//!
//! let mut dispatcher = context.dispatcher(supervisor.clone())?;
//! dispatcher.tick().await?;
//!
//! supervisor.stop_all().await;
//! ```

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod process;
pub mod prompt;
pub mod shutdown;
pub mod supervisor;

pub use context::{HuddleContext, AGENT_LOG_DIR, DAEMON_LOG_FILE, DAEMON_PID_FILE};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{Result, SupervisorError};
pub use process::{
    AgentProcess, AgentState, ExitInfo, ReconcileReport, SpawnOutcome, SpawnRequest, StopOutcome,
    Termination,
};
pub use prompt::{BasicPromptProvider, Prompt, PromptContext, PromptProvider};
pub use shutdown::{terminate, terminate_pid, watch_liveness, StopPolicy, LIVENESS_POLL};
pub use supervisor::Supervisor;
