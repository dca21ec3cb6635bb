//! Huddle Context - wiring for the daemon and the CLI
//!
//! Resolves the data directory once and builds every store, the driver
//! registry and the supervisor from one [`HuddleConfig`].
//!
//! ```text
//! <data_dir>/
//! ├── huddle.db        process records
//! ├── tasks.db         tasks
//! ├── daemon.pid
//! ├── daemon.log
//! └── agents/<chatroom>-<role>.log
//! ```

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::prompt::{BasicPromptProvider, PromptProvider};
use crate::shutdown::StopPolicy;
use crate::supervisor::Supervisor;
use huddle_driver::DriverRegistry;
use huddle_foundation::{HuddleConfig, ProcessRecordStore};
use huddle_task::{SqliteTaskStore, TaskLifecycle, TaskStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const DAEMON_PID_FILE: &str = "daemon.pid";
pub const DAEMON_LOG_FILE: &str = "daemon.log";
pub const AGENT_LOG_DIR: &str = "agents";

pub struct HuddleContext {
    config: Arc<HuddleConfig>,
    data_dir: PathBuf,
    registry: Arc<DriverRegistry>,
}

impl HuddleContext {
    pub fn new(config: HuddleConfig) -> Result<Self> {
        let data_dir = config.effective_data_dir();
        let registry = Arc::new(DriverRegistry::from_config(&config)?);
        debug!("Huddle data directory: {}", data_dir.display());
        Ok(Self {
            config: Arc::new(config),
            data_dir,
            registry,
        })
    }

    /// Global + project configuration
    pub fn load() -> Result<Self> {
        Self::new(HuddleConfig::load()?)
    }

    pub fn config(&self) -> &Arc<HuddleConfig> {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    pub fn daemon_pid_file(&self) -> PathBuf {
        self.data_dir.join(DAEMON_PID_FILE)
    }

    pub fn daemon_log_file(&self) -> PathBuf {
        self.data_dir.join(DAEMON_LOG_FILE)
    }

    pub fn agent_log_dir(&self) -> PathBuf {
        self.data_dir.join(AGENT_LOG_DIR)
    }

    pub fn stop_policy(&self) -> StopPolicy {
        StopPolicy::from_config(&self.config)
    }

    pub fn process_store(&self) -> Result<ProcessRecordStore> {
        Ok(ProcessRecordStore::open(&self.data_dir)?)
    }

    pub fn task_store(&self) -> Result<Arc<dyn TaskStore>> {
        Ok(Arc::new(SqliteTaskStore::open(&self.data_dir)?))
    }

    pub fn lifecycle(&self) -> Result<TaskLifecycle> {
        Ok(TaskLifecycle::new(self.task_store()?))
    }

    pub fn supervisor(&self) -> Result<Supervisor> {
        Ok(Supervisor::new(
            self.registry.clone(),
            self.process_store()?,
            self.stop_policy(),
        )
        .with_log_dir(self.agent_log_dir()))
    }

    /// Dispatcher over the persistent task store with basic prompts
    pub fn dispatcher(&self, supervisor: Arc<Supervisor>) -> Result<Dispatcher> {
        self.dispatcher_with(supervisor, Arc::new(BasicPromptProvider))
    }

    pub fn dispatcher_with(
        &self,
        supervisor: Arc<Supervisor>,
        prompts: Arc<dyn PromptProvider>,
    ) -> Result<Dispatcher> {
        Ok(Dispatcher::new(
            self.lifecycle()?,
            supervisor,
            prompts,
            self.config.clone(),
        ))
    }
}
