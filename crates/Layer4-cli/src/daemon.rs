//! `huddle daemon` - background supervisor management
//!
//! `start` re-executes this binary as `huddle daemon run`, detached, with
//! output appended to `daemon.log` and its pid written to `daemon.pid`.

use anyhow::{Context, Result};
use chrono::Utc;
use huddle_foundation::signal;
use huddle_supervisor::{HuddleContext, StopOutcome, StopPolicy, Supervisor, Termination};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Extra time the daemon gets on top of its own agents' stop sequence
const DAEMON_STOP_MARGIN: Duration = Duration::from_secs(5);

// ============================================================================
// Pid file
// ============================================================================

fn read_pid(pid_file: &Path) -> Result<Option<u32>> {
    if !pid_file.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(pid_file)
        .with_context(|| format!("Failed to read {}", pid_file.display()))?;
    Ok(raw.trim().parse::<u32>().ok())
}

/// Pid of a live daemon; a stale pid file is removed
fn live_daemon(pid_file: &Path) -> Result<Option<u32>> {
    match read_pid(pid_file)? {
        Some(pid) if signal::is_alive(pid) => Ok(Some(pid)),
        Some(pid) => {
            warn!(pid, "Removing stale daemon pid file");
            remove_pid_file(pid_file)?;
            Ok(None)
        }
        None if pid_file.exists() => {
            remove_pid_file(pid_file)?;
            Ok(None)
        }
        None => Ok(None),
    }
}

fn remove_pid_file(pid_file: &Path) -> Result<()> {
    match std::fs::remove_file(pid_file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", pid_file.display())),
    }
}

// ============================================================================
// Commands
// ============================================================================

pub fn start(context: &HuddleContext, debug: bool) -> Result<()> {
    let pid_file = context.daemon_pid_file();
    if let Some(pid) = live_daemon(&pid_file)? {
        anyhow::bail!("Daemon is already running (pid {}). Use 'huddle daemon stop' first.", pid);
    }

    std::fs::create_dir_all(context.data_dir())
        .with_context(|| format!("Failed to create {}", context.data_dir().display()))?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(context.daemon_log_file())
        .context("Failed to open daemon log")?;

    let exe = std::env::current_exe()?;
    let mut command = Command::new(exe);
    command.arg("daemon").arg("run");
    if debug {
        command.arg("--debug");
    }
    command
        .env(huddle_foundation::DATA_DIR_ENV, context.data_dir())
        .stdin(Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file);
    // leave the terminal's process group so Ctrl-C in the shell does not reach it
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = command.spawn().context("Failed to spawn daemon")?;
    std::fs::write(&pid_file, child.id().to_string())
        .with_context(|| format!("Failed to write {}", pid_file.display()))?;

    println!("Daemon started (pid {})", child.id());
    println!("Logs: {}", context.daemon_log_file().display());
    Ok(())
}

pub async fn stop(context: &HuddleContext) -> Result<()> {
    let pid_file = context.daemon_pid_file();
    let Some(pid) = live_daemon(&pid_file)? else {
        println!("Daemon is not running.");
        return Ok(());
    };

    let agents = context.stop_policy();
    let policy = StopPolicy::new(
        agents.grace_period + agents.kill_wait + DAEMON_STOP_MARGIN,
        agents.kill_wait,
    );
    let termination = huddle_supervisor::terminate_pid(pid, policy)
        .await
        .with_context(|| format!("Failed to stop daemon (pid {})", pid))?;
    remove_pid_file(&pid_file)?;

    match termination {
        Termination::Forced => println!("Daemon killed (pid {})", pid),
        _ => println!("Daemon stopped (pid {})", pid),
    }
    Ok(())
}

pub fn status(context: &HuddleContext) -> Result<()> {
    match read_pid(&context.daemon_pid_file())? {
        Some(pid) if signal::is_alive(pid) => println!("Daemon: RUNNING (pid {})", pid),
        Some(pid) => println!("Daemon: STOPPED (stale pid {})", pid),
        None => println!("Daemon: STOPPED"),
    }

    let records = context.process_store()?.list()?;
    if records.is_empty() {
        println!("\nNo agent processes.");
        return Ok(());
    }

    println!();
    println!(
        "{:<20} {:<10} {:<10} {:<8} {:<8} {:<6} {:<10}",
        "Chatroom", "Role", "Tool", "PID", "Owner", "Alive", "Uptime"
    );
    println!("{}", "-".repeat(78));
    for record in records {
        let alive = if signal::is_alive(record.pid) { "yes" } else { "no" };
        let uptime = (Utc::now() - record.started_at).num_seconds().max(0);
        println!(
            "{:<20} {:<10} {:<10} {:<8} {:<8} {:<6} {:<10}",
            record.chatroom_id.as_str(),
            record.role.as_str(),
            record.tool,
            record.pid,
            record.owner_pid,
            alive,
            format!("{}s", uptime)
        );
    }
    Ok(())
}

/// Foreground supervisor loop
pub async fn run(context: &HuddleContext) -> Result<()> {
    let pid_file = context.daemon_pid_file();
    let own_pid = std::process::id();
    if let Some(pid) = live_daemon(&pid_file)? {
        if pid != own_pid {
            anyhow::bail!("Daemon is already running (pid {})", pid);
        }
    }
    std::fs::create_dir_all(context.data_dir())?;
    std::fs::write(&pid_file, own_pid.to_string())
        .with_context(|| format!("Failed to write {}", pid_file.display()))?;
    info!(pid = own_pid, data_dir = %context.data_dir().display(), "Daemon starting");

    let supervisor = Arc::new(context.supervisor()?);
    let report = supervisor.reconcile().await?;
    info!(
        adopted = report.adopted.len(),
        removed = report.removed.len(),
        foreign = report.foreign.len(),
        "Reconciled process records"
    );

    let mut dispatcher = context.dispatcher(supervisor.clone())?;
    let mut ticker = tokio::time::interval(context.config().poll_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                if let Err(e) = dispatcher.tick().await {
                    error!("Dispatch tick failed: {}", e);
                }
            }
        }
    }

    info!("Shutting down, stopping agents");
    let failures = stop_agents(&supervisor).await;

    if read_pid(&pid_file)? == Some(own_pid) {
        remove_pid_file(&pid_file)?;
    }
    if failures > 0 {
        anyhow::bail!("{} agent(s) could not be stopped", failures);
    }
    info!("Daemon stopped");
    Ok(())
}

async fn stop_agents(supervisor: &Supervisor) -> usize {
    let mut failures = 0;
    for (chatroom_id, role, result) in supervisor.stop_all().await {
        match result {
            Ok(StopOutcome::Stopped { pid, termination }) => {
                info!(pid, role = %role, chatroom = %chatroom_id, ?termination, "Agent stopped");
            }
            Ok(StopOutcome::NotRunning) => {}
            Err(e) => {
                error!(role = %role, chatroom = %chatroom_id, "Failed to stop agent: {}", e);
                failures += 1;
            }
        }
    }
    failures
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
