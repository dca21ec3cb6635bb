//! Process signals
//!
//! Thin wrappers over `kill(2)`. Agent processes are spawned as process-group
//! leaders, so termination targets the whole group and takes helpers the agent
//! forked down with it.

use crate::{Error, Result};

/// Which signal to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM - ask the process to exit
    Graceful,
    /// SIGKILL - cannot be caught
    Forced,
}

/// Outcome of delivering a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    Delivered,
    /// No such process (already exited)
    Gone,
}

#[cfg(unix)]
fn raw_pid(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|p| *p > 0)
}

/// Zero-effect probe: does `pid` still refer to a live process?
///
/// `EPERM` counts as alive: the process exists, we just may not signal it.
/// A zombie nobody has reaped yet counts as gone.
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Some(raw) = raw_pid(pid) else {
        return false;
    };
    // SAFETY: signal 0 performs permission and existence checks only
    let rc = unsafe { libc::kill(raw, 0) };
    let exists =
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
    exists && !is_zombie(pid)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    // state is the first field after the parenthesized command name
    std::fs::read_to_string(format!("/proc/{}/stat", pid))
        .ok()
        .and_then(|stat| {
            stat.rsplit_once(')')
                .map(|(_, rest)| rest.trim_start().starts_with('Z'))
        })
        .unwrap_or(false)
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Send `signal` to `pid`, or to its whole process group when `group` is set.
///
/// Falls back to the single pid when the group no longer exists (the leader
/// may have called `setsid` itself).
#[cfg(unix)]
pub fn send(pid: u32, signal: StopSignal, group: bool) -> Result<SignalOutcome> {
    let raw = raw_pid(pid).ok_or_else(|| Error::signal(pid, "invalid pid"))?;
    let sig = match signal {
        StopSignal::Graceful => libc::SIGTERM,
        StopSignal::Forced => libc::SIGKILL,
    };

    if group {
        // SAFETY: negative pid addresses the process group led by `raw`
        let rc = unsafe { libc::kill(-raw, sig) };
        if rc == 0 {
            return Ok(SignalOutcome::Delivered);
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(Error::signal(pid, err.to_string()));
        }
    }

    // SAFETY: plain kill(2) on a positive pid
    let rc = unsafe { libc::kill(raw, sig) };
    if rc == 0 {
        return Ok(SignalOutcome::Delivered);
    }
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::ESRCH => Ok(SignalOutcome::Gone),
        _ => Err(Error::signal(pid, err.to_string())),
    }
}

#[cfg(not(unix))]
pub fn send(pid: u32, _signal: StopSignal, _group: bool) -> Result<SignalOutcome> {
    Err(Error::signal(pid, "signals are only supported on unix"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_current_process_is_alive() {
        assert!(is_alive(std::process::id()));
    }

    #[test]
    fn test_invalid_pids_are_not_alive() {
        assert!(!is_alive(0));
        assert!(!is_alive(u32::MAX));
    }

    #[test]
    fn test_reaped_child_is_gone() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!is_alive(pid));
        assert_eq!(
            send(pid, StopSignal::Graceful, false).unwrap(),
            SignalOutcome::Gone
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unreaped_child_is_not_alive() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id();
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!is_alive(pid));
        child.wait().unwrap();
    }

    #[test]
    fn test_forced_signal_kills_child() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert_eq!(
            send(pid, StopSignal::Forced, false).unwrap(),
            SignalOutcome::Delivered
        );
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
