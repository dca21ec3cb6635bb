//! Supervisor behavior against real `sh` children
#![cfg(unix)]

use huddle_driver::{DriverError, DriverRegistry};
use huddle_foundation::signal;
use huddle_foundation::{
    ChatroomId, HuddleConfig, ProcessRecord, ProcessRecordStore, Role, StopSignal, ToolOverride,
};
use huddle_supervisor::{
    AgentProcess, AgentState, SpawnOutcome, SpawnRequest, StopOutcome, StopPolicy, Supervisor,
    SupervisorError, Termination,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

const LONG_RUNNING: &str = "exec sleep 30";
const IGNORES_TERM: &str = "trap '' TERM; while true; do sleep 0.05; done";
const ECHO_STDIN: &str = r#"while IFS= read -r line; do echo "in:$line"; done"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Supervisor whose drivers run the given scripts
fn supervisor(dir: &Path, scripts: &[(&str, &str)], policy: StopPolicy) -> Supervisor {
    let mut config = HuddleConfig::new();
    for (tool, body) in scripts {
        let program = write_script(dir, tool, body);
        config = config.tool_override(
            *tool,
            ToolOverride {
                command: Some(program),
                ..Default::default()
            },
        );
    }
    let registry = Arc::new(DriverRegistry::from_config(&config).unwrap());
    Supervisor::new(registry, ProcessRecordStore::in_memory().unwrap(), policy)
        .with_log_dir(dir.join("agents"))
}

fn fast_policy() -> StopPolicy {
    StopPolicy::new(Duration::from_millis(300), Duration::from_secs(2))
}

fn room() -> ChatroomId {
    ChatroomId::new("room")
}

fn request(role: Role, tool: &str) -> SpawnRequest {
    SpawnRequest::new(room(), role, tool)
        .with_prompt("PROMPT")
        .with_message("HELLO")
}

async fn wait_for_state(sup: &Supervisor, role: Role, state: AgentState) -> AgentProcess {
    for _ in 0..100 {
        if let Some(process) = sup.get(&room(), role).await {
            if process.state == state {
                return process;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("agent {} never reached {}", role, state);
}

/// A pid that existed and has been reaped
fn dead_pid() -> u32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

/// A live process that is not a tokio child; reaped on a thread
fn spawn_foreign_sleep() -> u32 {
    let mut child = Command::new("sleep").arg("30").spawn().unwrap();
    let pid = child.id();
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    pid
}

#[tokio::test]
async fn test_spawn_is_idempotent_and_stop_is_noop_twice() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", LONG_RUNNING)], fast_policy());

    let first = sup.spawn(request(Role::Builder, "claude")).await.unwrap();
    let SpawnOutcome::Started { pid } = first else {
        panic!("expected a fresh start, got {:?}", first);
    };
    let second = sup.spawn(request(Role::Builder, "claude")).await.unwrap();
    assert_eq!(second, SpawnOutcome::AlreadyRunning { pid });

    let record = sup.records().get(&room(), Role::Builder).unwrap().unwrap();
    assert_eq!(record.pid, pid);
    assert_eq!(record.owner_pid, sup.owner_pid());

    let stopped = sup.stop(&room(), Role::Builder).await.unwrap();
    assert_eq!(
        stopped,
        StopOutcome::Stopped {
            pid,
            termination: Termination::Graceful
        }
    );
    assert!(!signal::is_alive(pid));
    assert!(sup.records().get(&room(), Role::Builder).unwrap().is_none());

    assert!(sup.stop(&room(), Role::Builder).await.unwrap().is_noop());
    let process = sup.get(&room(), Role::Builder).await.unwrap();
    assert_eq!(process.state, AgentState::Stopped);
    assert_eq!(process.pid, None);
}

#[tokio::test]
async fn test_stop_unknown_agent_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[], fast_policy());
    assert_eq!(
        sup.stop(&room(), Role::Reviewer).await.unwrap(),
        StopOutcome::NotRunning
    );
}

#[tokio::test]
async fn test_stop_escalates_to_sigkill() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", IGNORES_TERM)], fast_policy());

    let pid = sup.spawn(request(Role::Planner, "claude")).await.unwrap().pid();
    // let the trap install
    tokio::time::sleep(Duration::from_millis(150)).await;

    let outcome = sup.stop(&room(), Role::Planner).await.unwrap();
    assert_eq!(
        outcome,
        StopOutcome::Stopped {
            pid,
            termination: Termination::Forced
        }
    );
    assert!(sup.records().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_unexpected_exit_is_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", "sleep 0.2; exit 3")], fast_policy());

    sup.spawn(request(Role::Builder, "claude")).await.unwrap();
    let process = wait_for_state(&sup, Role::Builder, AgentState::Crashed).await;
    assert_eq!(process.exit.and_then(|e| e.code), Some(3));
    assert_eq!(process.pid, None);
    assert!(sup.records().get(&room(), Role::Builder).unwrap().is_none());

    // a crashed agent can be started again
    let outcome = sup.spawn(request(Role::Builder, "claude")).await.unwrap();
    assert!(matches!(outcome, SpawnOutcome::Started { .. }));
    let _ = wait_for_state(&sup, Role::Builder, AgentState::Crashed).await;
}

#[tokio::test]
async fn test_clean_exit_without_stop_is_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", "exit 0")], fast_policy());

    sup.spawn(request(Role::Reviewer, "claude")).await.unwrap();
    let process = wait_for_state(&sup, Role::Reviewer, AgentState::Crashed).await;
    // the exit code still tells a clean exit apart
    let exit = process.exit.unwrap();
    assert!(exit.success());
    assert_eq!(exit.code, Some(0));
    assert!(sup.records().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_stops_serialize() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", LONG_RUNNING)], fast_policy());
    let pid = sup.spawn(request(Role::Builder, "claude")).await.unwrap().pid();

    let (room_a, room_b) = (room(), room());
    let (a, b) = tokio::join!(
        sup.stop(&room_a, Role::Builder),
        sup.stop(&room_b, Role::Builder)
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let stopped = outcomes
        .iter()
        .filter(|o| matches!(o, StopOutcome::Stopped { pid: p, .. } if *p == pid))
        .count();
    let noops = outcomes.iter().filter(|o| o.is_noop()).count();
    assert_eq!((stopped, noops), (1, 1), "{:?}", outcomes);

    assert!(!signal::is_alive(pid));
    assert!(sup.records().get(&room(), Role::Builder).unwrap().is_none());
    let process = sup.get(&room(), Role::Builder).await.unwrap();
    assert_eq!(process.state, AgentState::Stopped);
}

#[tokio::test]
async fn test_spawn_failure_leaves_no_entry() {
    let dir = tempfile::tempdir().unwrap();
    let config = HuddleConfig::new().tool_override(
        "claude",
        ToolOverride {
            command: Some(dir.path().join("missing")),
            ..Default::default()
        },
    );
    let sup = Supervisor::new(
        Arc::new(DriverRegistry::from_config(&config).unwrap()),
        ProcessRecordStore::in_memory().unwrap(),
        fast_policy(),
    );

    let err = sup.spawn(request(Role::Builder, "claude")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Driver(DriverError::Spawn { .. })));
    assert!(sup.get(&room(), Role::Builder).await.is_none());
    assert!(sup.records().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_inject_message_reaches_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("pi", ECHO_STDIN)], fast_policy());

    sup.spawn(request(Role::Builder, "pi")).await.unwrap();
    sup.inject_message(&room(), Role::Builder, "NUDGE").await.unwrap();
    sup.stop(&room(), Role::Builder).await.unwrap();

    let log = std::fs::read_to_string(dir.path().join("agents").join("room-builder.log")).unwrap();
    assert!(log.contains("in:PROMPT\n"));
    assert!(log.contains("in:HELLO\n"));
    assert!(log.contains("in:NUDGE\n"));
}

#[tokio::test]
async fn test_inject_requires_capability_and_running_agent() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", LONG_RUNNING)], fast_policy());

    let err = sup
        .inject_message(&room(), Role::Builder, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessNotFound { .. }));

    sup.spawn(request(Role::Builder, "claude")).await.unwrap();
    let err = sup
        .inject_message(&room(), Role::Builder, "hi")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::Driver(DriverError::UnsupportedCapability { .. })
    ));
    sup.stop(&room(), Role::Builder).await.unwrap();
}

#[tokio::test]
async fn test_abort_gated_on_capability() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(
        dir.path(),
        &[("opencode", LONG_RUNNING), ("pi", LONG_RUNNING)],
        fast_policy(),
    );

    sup.spawn(request(Role::Reviewer, "opencode")).await.unwrap();
    let err = sup.abort(&room(), Role::Reviewer).await.unwrap_err();
    assert!(matches!(
        err,
        SupervisorError::Driver(DriverError::UnsupportedCapability { .. })
    ));
    assert_eq!(
        sup.get(&room(), Role::Reviewer).await.unwrap().state,
        AgentState::Running
    );

    sup.spawn(request(Role::Builder, "pi")).await.unwrap();
    let outcome = sup.abort(&room(), Role::Builder).await.unwrap();
    assert!(matches!(outcome, StopOutcome::Stopped { .. }));
    assert!(sup.abort(&room(), Role::Builder).await.unwrap().is_noop());

    sup.stop(&room(), Role::Reviewer).await.unwrap();
}

#[tokio::test]
async fn test_stop_all_stops_every_agent() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", LONG_RUNNING)], fast_policy());

    let planner = sup.spawn(request(Role::Planner, "claude")).await.unwrap().pid();
    let builder = sup.spawn(request(Role::Builder, "claude")).await.unwrap().pid();

    let results = sup.stop_all().await;
    assert_eq!(results.len(), 2);
    for (_, _, result) in results {
        assert!(matches!(result.unwrap(), StopOutcome::Stopped { .. }));
    }
    assert!(!signal::is_alive(planner));
    assert!(!signal::is_alive(builder));

    let states: Vec<AgentState> = sup.snapshot().await.iter().map(|p| p.state).collect();
    assert_eq!(states, vec![AgentState::Stopped, AgentState::Stopped]);
}

#[tokio::test]
async fn test_reconcile_removes_dead_records() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[], fast_policy());
    let pid = dead_pid();
    sup.records()
        .upsert(&ProcessRecord::new(room(), Role::Builder, pid, "claude", dead_pid()))
        .unwrap();

    let report = sup.reconcile().await.unwrap();
    assert_eq!(report.removed, vec![(room(), Role::Builder, pid)]);
    assert!(report.adopted.is_empty());
    assert!(sup.records().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_reconcile_leaves_foreign_processes_alone() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", LONG_RUNNING)], fast_policy());
    let pid = spawn_foreign_sleep();
    // pid 1 is always alive
    sup.records()
        .upsert(&ProcessRecord::new(room(), Role::Planner, pid, "claude", 1))
        .unwrap();

    let report = sup.reconcile().await.unwrap();
    assert_eq!(report.foreign, vec![(room(), Role::Planner, pid)]);
    assert!(sup.get(&room(), Role::Planner).await.is_none());

    let err = sup.spawn(request(Role::Planner, "claude")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyOwned { owner: 1, .. }));

    signal::send(pid, StopSignal::Forced, false).unwrap();
}

#[tokio::test]
async fn test_reconcile_adopts_orphans_and_stops_them() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[], fast_policy());
    let pid = spawn_foreign_sleep();
    sup.records()
        .upsert(&ProcessRecord::new(room(), Role::Reviewer, pid, "claude", dead_pid()))
        .unwrap();

    let report = sup.reconcile().await.unwrap();
    assert_eq!(report.adopted, vec![(room(), Role::Reviewer, pid)]);

    let process = sup.get(&room(), Role::Reviewer).await.unwrap();
    assert_eq!(process.state, AgentState::Running);
    assert!(process.adopted);
    let record = sup.records().get(&room(), Role::Reviewer).unwrap().unwrap();
    assert_eq!(record.owner_pid, sup.owner_pid());

    // a second pass finds it already tracked
    let again = sup.reconcile().await.unwrap();
    assert!(again.adopted.is_empty() && again.foreign.is_empty());

    let outcome = sup.stop(&room(), Role::Reviewer).await.unwrap();
    assert!(matches!(outcome, StopOutcome::Stopped { pid: p, .. } if p == pid));
    assert!(sup.records().list().unwrap().is_empty());
}

#[tokio::test]
async fn test_spawn_adopts_live_agent_of_dead_owner() {
    let dir = tempfile::tempdir().unwrap();
    let sup = supervisor(dir.path(), &[("claude", LONG_RUNNING)], fast_policy());

    let orphan = spawn_foreign_sleep();
    sup.records()
        .upsert(&ProcessRecord::new(room(), Role::Builder, orphan, "claude", dead_pid()))
        .unwrap();

    // no second agent; the orphan is taken over instead
    let outcome = sup.spawn(request(Role::Builder, "claude")).await.unwrap();
    assert_eq!(outcome, SpawnOutcome::AlreadyRunning { pid: orphan });

    let record = sup.records().get(&room(), Role::Builder).unwrap().unwrap();
    assert_eq!(record.pid, orphan);
    assert_eq!(record.owner_pid, sup.owner_pid());
    let process = sup.get(&room(), Role::Builder).await.unwrap();
    assert_eq!(process.state, AgentState::Running);
    assert!(process.adopted);

    let outcome = sup.stop(&room(), Role::Builder).await.unwrap();
    assert!(matches!(outcome, StopOutcome::Stopped { pid, .. } if pid == orphan));
    assert!(!signal::is_alive(orphan));
    assert!(sup.records().list().unwrap().is_empty());
}
