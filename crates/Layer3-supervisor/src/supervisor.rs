//! Process Supervisor
//!
//! Owns the agent processes running on this machine, one per
//! `(chatroom, role)`. Every entry sits behind its own lock so concurrent
//! spawn/stop requests for the same role serialize, while different roles
//! proceed in parallel.
//!
//! Each started agent is persisted to the [`ProcessRecordStore`] right away.
//! A supervisor that starts later calls [`Supervisor::reconcile`] to clean
//! up dead records and take over processes whose owner is gone.

use crate::error::{Result, SupervisorError};
use crate::process::{
    AgentProcess, AgentState, ExitInfo, ReconcileReport, SpawnOutcome, SpawnRequest, StopOutcome,
};
use crate::shutdown::{self, ExitReceiver, StopPolicy, LIVENESS_POLL};
use futures::future::join_all;
use huddle_driver::{Capability, DriverRegistry, StartOptions, ToolDriver};
use huddle_foundation::signal::{self, StopSignal};
use huddle_foundation::{ChatroomId, ProcessRecord, ProcessRecordStore, Role};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin};
use tokio::sync::{watch, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};

type AgentKey = (ChatroomId, Role);

/// Per-role slot; its mutex is the per-record lock
struct AgentEntry {
    process: AgentProcess,
    stdin: Option<ChildStdin>,
    exited: Option<ExitReceiver>,
    /// Set before any supervisor-initiated signal, so the exit monitor does
    /// not mistake the exit for a crash
    stop_requested: Arc<AtomicBool>,
    /// Bumped on every start; stale monitors compare against it
    generation: u64,
    /// Dropped from the map; waiters must look the key up again
    retired: bool,
}

impl AgentEntry {
    fn vacant(key: &AgentKey) -> Self {
        Self {
            process: AgentProcess::vacant(key.0.clone(), key.1),
            stdin: None,
            exited: None,
            stop_requested: Arc::new(AtomicBool::new(false)),
            generation: 0,
            retired: false,
        }
    }
}

/// Where a monitor learns about the exit
enum ExitSource {
    Child(Child),
    Adopted(u32),
}

pub struct Supervisor {
    registry: Arc<DriverRegistry>,
    records: ProcessRecordStore,
    agents: RwLock<HashMap<AgentKey, Arc<Mutex<AgentEntry>>>>,
    policy: StopPolicy,
    log_dir: Option<PathBuf>,
    owner_pid: u32,
}

impl Supervisor {
    pub fn new(
        registry: Arc<DriverRegistry>,
        records: ProcessRecordStore,
        policy: StopPolicy,
    ) -> Self {
        Self {
            registry,
            records,
            agents: RwLock::new(HashMap::with_capacity(8)),
            policy,
            log_dir: None,
            owner_pid: std::process::id(),
        }
    }

    /// Agent output goes to `<dir>/<chatroom>-<role>.log`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn registry(&self) -> &Arc<DriverRegistry> {
        &self.registry
    }

    pub fn records(&self) -> &ProcessRecordStore {
        &self.records
    }

    pub fn owner_pid(&self) -> u32 {
        self.owner_pid
    }

    pub fn log_path(&self, chatroom_id: &ChatroomId, role: Role) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}-{}.log", chatroom_id, role)))
    }

    // ========================================================================
    // Entry map
    // ========================================================================

    async fn existing(&self, key: &AgentKey) -> Option<Arc<Mutex<AgentEntry>>> {
        self.agents.read().await.get(key).cloned()
    }

    /// Lock the slot for `key`, creating it when absent
    async fn lock_slot(
        &self,
        key: &AgentKey,
    ) -> (Arc<Mutex<AgentEntry>>, OwnedMutexGuard<AgentEntry>) {
        loop {
            let slot = {
                let mut agents = self.agents.write().await;
                agents
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(AgentEntry::vacant(key))))
                    .clone()
            };
            let guard = slot.clone().lock_owned().await;
            if !guard.retired {
                return (slot, guard);
            }
        }
    }

    /// Drop a slot that never held a process. Only a lock holder removes a
    /// slot, so the map still points at ours.
    async fn retire(&self, key: &AgentKey, entry: &mut AgentEntry) {
        entry.retired = true;
        self.agents.write().await.remove(key);
    }

    // ========================================================================
    // Spawn
    // ========================================================================

    /// Start an agent for `(chatroom, role)` unless one is already running
    pub async fn spawn(&self, request: SpawnRequest) -> Result<SpawnOutcome> {
        let key: AgentKey = (request.chatroom_id.clone(), request.role);
        let driver = self.registry.get(&request.tool)?;

        let (slot, mut entry) = self.lock_slot(&key).await;
        if entry.process.state.is_live() {
            if let Some(pid) = entry.process.pid {
                debug!(pid, role = %key.1, chatroom = %key.0, "Agent already running");
                return Ok(SpawnOutcome::AlreadyRunning { pid });
            }
        }

        // a live recorded process is never duplicated: it is either another
        // live supervisor's, or an orphan we take over
        if let Some(existing) = self.records.get(&key.0, key.1)? {
            if signal::is_alive(existing.pid) {
                let foreign = existing.owner_pid != self.owner_pid;
                if foreign && signal::is_alive(existing.owner_pid) {
                    if entry.process.started_at.is_none() {
                        self.retire(&key, &mut entry).await;
                    }
                    return Err(SupervisorError::AlreadyOwned {
                        pid: existing.pid,
                        owner: existing.owner_pid,
                    });
                }
                if foreign && !self.claim_record(&existing)? {
                    let current = self.records.get(&key.0, key.1)?;
                    if entry.process.started_at.is_none() {
                        self.retire(&key, &mut entry).await;
                    }
                    return Err(SupervisorError::AlreadyOwned {
                        pid: existing.pid,
                        owner: current.map_or(existing.owner_pid, |r| r.owner_pid),
                    });
                }
                let pid = existing.pid;
                self.adopt(slot, entry, &existing);
                return Ok(SpawnOutcome::AlreadyRunning { pid });
            }
        }

        let previous = entry.process.clone();
        entry.process.state = AgentState::Starting;
        entry.process.tool = request.tool.clone();

        let mut options = StartOptions::new(key.0.clone(), key.1)
            .with_prompt(request.role_prompt)
            .with_message(request.initial_message)
            .with_model(request.model);
        if let Some(path) = self.log_path(&key.0, key.1) {
            options = options.with_log_path(path);
        }
        if let Some(dir) = request.workdir {
            options = options.with_workdir(dir);
        }

        let handle = match driver.start(options).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(tool = %request.tool, role = %key.1, chatroom = %key.0, "Spawn failed: {}", e);
                if previous.started_at.is_none() {
                    self.retire(&key, &mut entry).await;
                } else {
                    entry.process = previous;
                }
                return Err(e.into());
            }
        };

        let pid = handle.pid;
        let record = ProcessRecord::new(key.0.clone(), key.1, pid, &request.tool, self.owner_pid);
        if let Err(e) = self.records.upsert(&record) {
            error!(pid, "Failed to persist process record, killing agent: {}", e);
            let _ = signal::send(pid, StopSignal::Forced, true);
            let mut child = handle.child;
            let _ = child.wait().await;
            if previous.started_at.is_none() {
                self.retire(&key, &mut entry).await;
            } else {
                entry.process = previous;
            }
            return Err(e.into());
        }

        let stop_requested = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = watch::channel(None);
        entry.generation += 1;
        entry.stop_requested = stop_requested.clone();
        entry.exited = Some(exit_rx);
        entry.stdin = handle.stdin;
        entry.process = AgentProcess {
            chatroom_id: key.0.clone(),
            role: key.1,
            tool: request.tool.clone(),
            pid: Some(pid),
            state: AgentState::Running,
            adopted: false,
            started_at: Some(record.started_at),
            exit: None,
        };
        let generation = entry.generation;
        drop(entry);

        self.monitor(
            ExitSource::Child(handle.child),
            slot,
            exit_tx,
            stop_requested,
            generation,
        );

        info!(pid, tool = %request.tool, role = %key.1, chatroom = %key.0, "Agent running");
        Ok(SpawnOutcome::Started { pid })
    }

    /// Reap (or probe) the process and record an unexpected exit
    fn monitor(
        &self,
        source: ExitSource,
        slot: Arc<Mutex<AgentEntry>>,
        exit_tx: watch::Sender<Option<ExitInfo>>,
        stop_requested: Arc<AtomicBool>,
        generation: u64,
    ) {
        let records = self.records.clone();
        tokio::spawn(async move {
            let exit = match source {
                ExitSource::Child(mut child) => match child.wait().await {
                    Ok(status) => ExitInfo::from(status),
                    Err(e) => {
                        warn!("Failed to wait on agent process: {}", e);
                        ExitInfo::unknown()
                    }
                },
                ExitSource::Adopted(pid) => {
                    while signal::is_alive(pid) {
                        tokio::time::sleep(LIVENESS_POLL).await;
                    }
                    ExitInfo::unknown()
                }
            };
            let _ = exit_tx.send(Some(exit));

            if stop_requested.load(Ordering::SeqCst) {
                return;
            }

            let mut entry = slot.lock().await;
            if entry.generation != generation || entry.process.state != AgentState::Running {
                return;
            }
            let Some(pid) = entry.process.pid.take() else {
                return;
            };

            // any exit we did not ask for is a crash; `exit` keeps the code
            entry.process.state = AgentState::Crashed;
            entry.process.exit = Some(exit);
            entry.stdin = None;

            let chatroom_id = entry.process.chatroom_id.clone();
            let role = entry.process.role;
            warn!(pid, role = %role, chatroom = %chatroom_id, "Agent exited unexpectedly ({})", exit);
            if let Err(e) = records.remove(&chatroom_id, role, pid) {
                warn!(pid, "Failed to remove process record: {}", e);
            }
        });
    }

    // ========================================================================
    // Stop
    // ========================================================================

    /// Graceful-then-forced stop. Stopping nothing is a no-op, not an error.
    pub async fn stop(&self, chatroom_id: &ChatroomId, role: Role) -> Result<StopOutcome> {
        let key: AgentKey = (chatroom_id.clone(), role);
        let Some(slot) = self.existing(&key).await else {
            return Ok(StopOutcome::NotRunning);
        };

        let mut entry = slot.lock().await;
        if entry.retired || !entry.process.state.is_live() {
            return Ok(StopOutcome::NotRunning);
        }
        let Some(pid) = entry.process.pid else {
            return Ok(StopOutcome::NotRunning);
        };

        entry.process.state = AgentState::Stopping;
        entry.stop_requested.store(true, Ordering::SeqCst);
        entry.stdin = None;
        info!(pid, role = %role, chatroom = %chatroom_id, "Stopping agent");

        let mut exited = match entry.exited.clone() {
            Some(rx) => rx,
            None => shutdown::watch_liveness(pid, LIVENESS_POLL),
        };

        match shutdown::terminate(pid, &mut exited, self.policy).await {
            Ok(termination) => {
                entry.process.state = AgentState::Stopped;
                entry.process.pid = None;
                entry.process.exit = *exited.borrow();
                entry.stdin = None;
                self.records.remove(chatroom_id, role, pid)?;
                info!(pid, role = %role, chatroom = %chatroom_id, ?termination, "Agent stopped");
                Ok(StopOutcome::Stopped { pid, termination })
            }
            Err(e) => {
                error!(pid, role = %role, chatroom = %chatroom_id, "Termination failed: {}", e);
                entry.process.state = AgentState::Crashed;
                if let Err(remove_err) = self.records.remove(chatroom_id, role, pid) {
                    warn!(pid, "Failed to remove process record: {}", remove_err);
                }
                Err(e)
            }
        }
    }

    /// Interrupt an agent; only for drivers declaring `abort`
    pub async fn abort(&self, chatroom_id: &ChatroomId, role: Role) -> Result<StopOutcome> {
        let Some(tool) = self.live_tool(chatroom_id, role).await else {
            return Ok(StopOutcome::NotRunning);
        };
        self.registry.get(&tool)?.require(Capability::Abort)?;
        self.stop(chatroom_id, role).await
    }

    /// Stop every live agent in parallel
    pub async fn stop_all(&self) -> Vec<(ChatroomId, Role, Result<StopOutcome>)> {
        let keys: Vec<AgentKey> = self.agents.read().await.keys().cloned().collect();
        let stops = keys.iter().map(|(chatroom_id, role)| async move {
            (chatroom_id.clone(), *role, self.stop(chatroom_id, *role).await)
        });
        join_all(stops).await
    }

    // ========================================================================
    // Messaging
    // ========================================================================

    /// Write one line to the agent's stdin; only for drivers declaring
    /// `messageInjection`
    pub async fn inject_message(
        &self,
        chatroom_id: &ChatroomId,
        role: Role,
        text: &str,
    ) -> Result<()> {
        let not_found = || SupervisorError::ProcessNotFound {
            chatroom_id: chatroom_id.clone(),
            role,
        };
        let slot = self
            .existing(&(chatroom_id.clone(), role))
            .await
            .ok_or_else(not_found)?;

        let mut entry = slot.lock().await;
        if entry.process.state != AgentState::Running {
            return Err(not_found());
        }
        self.registry
            .get(&entry.process.tool)?
            .require(Capability::MessageInjection)?;

        let stdin = entry.stdin.as_mut().ok_or_else(not_found)?;
        let mut line = text.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(huddle_driver::DriverError::Io)?;
        stdin.flush().await.map_err(huddle_driver::DriverError::Io)?;
        debug!(role = %role, chatroom = %chatroom_id, bytes = line.len(), "Message injected");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    async fn live_tool(&self, chatroom_id: &ChatroomId, role: Role) -> Option<String> {
        let slot = self.existing(&(chatroom_id.clone(), role)).await?;
        let entry = slot.lock().await;
        entry
            .process
            .state
            .is_live()
            .then(|| entry.process.tool.clone())
    }

    pub async fn get(&self, chatroom_id: &ChatroomId, role: Role) -> Option<AgentProcess> {
        let slot = self.existing(&(chatroom_id.clone(), role)).await?;
        let entry = slot.lock().await;
        (!entry.retired).then(|| entry.process.clone())
    }

    /// Every known agent, ordered by chatroom then role
    pub async fn snapshot(&self) -> Vec<AgentProcess> {
        let slots: Vec<_> = self.agents.read().await.values().cloned().collect();
        let mut processes = Vec::with_capacity(slots.len());
        for slot in slots {
            let entry = slot.lock().await;
            if !entry.retired {
                processes.push(entry.process.clone());
            }
        }
        processes.sort_by(|a, b| {
            a.chatroom_id
                .cmp(&b.chatroom_id)
                .then(a.role.cmp(&b.role))
        });
        processes
    }

    // ========================================================================
    // Reconcile
    // ========================================================================

    /// Sort persisted records left by earlier supervisors into dead
    /// (deleted), foreign (left alone) and orphaned (adopted).
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for record in self.records.list()? {
            let key: AgentKey = (record.chatroom_id.clone(), record.role);
            let entry_info = (record.chatroom_id.clone(), record.role, record.pid);

            if !signal::is_alive(record.pid) {
                self.records
                    .remove(&record.chatroom_id, record.role, record.pid)?;
                info!(pid = record.pid, role = %record.role, chatroom = %record.chatroom_id, "Removed stale process record");
                report.removed.push(entry_info);
                continue;
            }

            if record.owner_pid != self.owner_pid && signal::is_alive(record.owner_pid) {
                debug!(pid = record.pid, owner = record.owner_pid, "Process owned by another supervisor");
                report.foreign.push(entry_info);
                continue;
            }

            let (slot, mut entry) = self.lock_slot(&key).await;
            if entry.process.state.is_live() {
                // already tracked by this supervisor
                continue;
            }

            if record.owner_pid != self.owner_pid && !self.claim_record(&record)? {
                report.foreign.push(entry_info);
                if entry.process.started_at.is_none() {
                    self.retire(&key, &mut entry).await;
                }
                continue;
            }

            self.adopt(slot, entry, &record);
            report.adopted.push(entry_info);
        }

        Ok(report)
    }

    /// Move a record's ownership to this supervisor; false if someone else
    /// changed it first
    fn claim_record(&self, record: &ProcessRecord) -> Result<bool> {
        Ok(self.records.transfer_ownership(
            &record.chatroom_id,
            record.role,
            record.pid,
            record.owner_pid,
            self.owner_pid,
        )?)
    }

    /// Track a live process we did not start, watching it by liveness
    fn adopt(
        &self,
        slot: Arc<Mutex<AgentEntry>>,
        mut entry: OwnedMutexGuard<AgentEntry>,
        record: &ProcessRecord,
    ) {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = watch::channel(None);
        entry.generation += 1;
        entry.stop_requested = stop_requested.clone();
        entry.exited = Some(exit_rx);
        entry.stdin = None;
        entry.process = AgentProcess {
            chatroom_id: record.chatroom_id.clone(),
            role: record.role,
            tool: record.tool.clone(),
            pid: Some(record.pid),
            state: AgentState::Running,
            adopted: true,
            started_at: Some(record.started_at),
            exit: None,
        };
        let generation = entry.generation;
        drop(entry);

        self.monitor(
            ExitSource::Adopted(record.pid),
            slot,
            exit_tx,
            stop_requested,
            generation,
        );
        info!(pid = record.pid, role = %record.role, chatroom = %record.chatroom_id, "Adopted agent process");
    }
}
