//! Graceful-then-forced termination
//!
//! Two phases, each racing "process exited" against a timer:
//!
//! 1. SIGTERM to the process group, wait up to the grace period
//! 2. SIGKILL, wait up to the kill wait
//!
//! The exit is observed through a `watch` channel, fed either by the task
//! that reaps our own child or by a liveness poller for processes we did not
//! spawn.

use crate::error::{Result, SupervisorError};
use crate::process::{ExitInfo, Termination};
use huddle_foundation::signal::{self, SignalOutcome, StopSignal};
use huddle_foundation::HuddleConfig;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Liveness probe interval for processes that are not our children
pub const LIVENESS_POLL: Duration = Duration::from_millis(50);

/// Exit notification; `None` until the process is gone
pub type ExitReceiver = watch::Receiver<Option<ExitInfo>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    /// SIGTERM to SIGKILL
    pub grace_period: Duration,
    /// SIGKILL to giving up
    pub kill_wait: Duration,
}

impl StopPolicy {
    pub fn new(grace_period: Duration, kill_wait: Duration) -> Self {
        Self {
            grace_period,
            kill_wait,
        }
    }

    pub fn from_config(config: &HuddleConfig) -> Self {
        Self::new(config.grace_period(), config.kill_wait())
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self::from_config(&HuddleConfig::new())
    }
}

/// Wait until `exited` reports an exit or `limit` elapses
async fn wait_exit(exited: &mut ExitReceiver, limit: Duration) -> bool {
    match tokio::time::timeout(limit, exited.wait_for(|e| e.is_some())).await {
        Ok(_) => true,
        Err(_) => false,
    }
}

/// Watch a pid we cannot `wait` on
pub fn watch_liveness(pid: u32, interval: Duration) -> ExitReceiver {
    let (tx, rx) = watch::channel(None);
    tokio::spawn(async move {
        loop {
            if !signal::is_alive(pid) {
                let _ = tx.send(Some(ExitInfo::unknown()));
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = tx.closed() => break,
            }
        }
    });
    rx
}

/// Stop `pid` (and its process group), escalating to SIGKILL when the grace
/// period runs out
pub async fn terminate(
    pid: u32,
    exited: &mut ExitReceiver,
    policy: StopPolicy,
) -> Result<Termination> {
    if exited.borrow().is_some() {
        return Ok(Termination::AlreadyExited);
    }

    match signal::send(pid, StopSignal::Graceful, true) {
        Ok(SignalOutcome::Gone) => return Ok(Termination::AlreadyExited),
        Ok(SignalOutcome::Delivered) => {}
        Err(e) => return Err(SupervisorError::termination(pid, e)),
    }
    debug!(pid, "SIGTERM sent, waiting {:?}", policy.grace_period);

    if wait_exit(exited, policy.grace_period).await {
        return Ok(Termination::Graceful);
    }

    warn!(pid, "Grace period elapsed, sending SIGKILL");
    match signal::send(pid, StopSignal::Forced, true) {
        Ok(SignalOutcome::Gone) => return Ok(Termination::Forced),
        Ok(SignalOutcome::Delivered) => {}
        Err(e) => return Err(SupervisorError::termination(pid, e)),
    }

    if wait_exit(exited, policy.kill_wait).await {
        Ok(Termination::Forced)
    } else {
        Err(SupervisorError::termination(
            pid,
            format!("still alive {:?} after SIGKILL", policy.kill_wait),
        ))
    }
}

/// [`terminate`] for a pid that is not our child, observed by probing
pub async fn terminate_pid(pid: u32, policy: StopPolicy) -> Result<Termination> {
    if !signal::is_alive(pid) {
        return Ok(Termination::AlreadyExited);
    }
    let mut exited = watch_liveness(pid, LIVENESS_POLL);
    terminate(pid, &mut exited, policy).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn fast_policy() -> StopPolicy {
        StopPolicy::new(Duration::from_millis(300), Duration::from_secs(2))
    }

    /// Reap on a thread so the pid disappears once the process dies
    fn spawn_reaped(script: &str) -> u32 {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        pid
    }

    #[tokio::test]
    async fn test_graceful_exit_within_grace_period() {
        let pid = spawn_reaped("exec sleep 30");
        let outcome = terminate_pid(pid, fast_policy()).await.unwrap();
        assert_eq!(outcome, Termination::Graceful);
        assert!(!signal::is_alive(pid));
    }

    #[tokio::test]
    async fn test_escalates_when_term_ignored() {
        let pid = spawn_reaped("trap '' TERM; while true; do sleep 0.05; done");
        // let the trap install
        tokio::time::sleep(Duration::from_millis(100)).await;
        let outcome = terminate_pid(pid, fast_policy()).await.unwrap();
        assert_eq!(outcome, Termination::Forced);
    }

    #[tokio::test]
    async fn test_already_gone() {
        let pid = spawn_reaped("exit 0");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            terminate_pid(pid, fast_policy()).await.unwrap(),
            Termination::AlreadyExited
        );
    }
}
