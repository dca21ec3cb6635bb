//! End-to-end runs of the `huddle` binary against a scratch data directory
#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;

fn huddle(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_huddle"))
        .args(args)
        .current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("HUDDLE_DATA_DIR", home.join("data"))
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_task_commands_follow_chat_graph() {
    let home = tempfile::tempdir().unwrap();

    let created = huddle(home.path(), &["task", "create", "-c", "room", "write the parser"]);
    assert!(created.status.success(), "{}", stderr(&created));
    let id = stdout(&created).trim().to_string();
    let prefix = &id[..8];

    let moved = huddle(
        home.path(),
        &["task", "move", prefix, "pending", "--assign", "builder"],
    );
    assert!(moved.status.success(), "{}", stderr(&moved));
    assert!(stdout(&moved).contains("queued -> pending"));

    // skipping acknowledged is rejected and changes nothing
    let skipped = huddle(home.path(), &["task", "move", prefix, "in-progress", "--as", "builder"]);
    assert!(!skipped.status.success());
    assert!(stderr(&skipped).contains("Illegal transition"));

    let stolen = huddle(home.path(), &["task", "claim", prefix, "--as", "reviewer"]);
    assert!(!stolen.status.success());
    assert!(stderr(&stolen).contains("may not move"));

    let claimed = huddle(home.path(), &["task", "claim", prefix, "--as", "builder"]);
    assert!(claimed.status.success(), "{}", stderr(&claimed));

    let listed = huddle(home.path(), &["task", "list", "--chatroom", "room", "--json"]);
    let tasks: serde_json::Value = serde_json::from_str(&stdout(&listed)).unwrap();
    assert_eq!(tasks.as_array().unwrap().len(), 1);
    assert_eq!(tasks[0]["id"], id.as_str());
    assert_eq!(tasks[0]["status"], "acknowledged");
    assert_eq!(tasks[0]["assignedRole"], "builder");

    let shown = huddle(home.path(), &["task", "show", &id]);
    assert!(stdout(&shown).contains("Next:      in_progress"));
}

#[test]
fn test_unknown_values_are_rejected() {
    let home = tempfile::tempdir().unwrap();
    let bad_origin = huddle(
        home.path(),
        &["task", "create", "-c", "room", "-o", "email", "x"],
    );
    assert!(!bad_origin.status.success());

    let bad_tool = huddle(home.path(), &["models", "cursor"]);
    assert!(!bad_tool.status.success());
}

#[test]
fn test_tools_lists_every_driver() {
    let home = tempfile::tempdir().unwrap();
    let output = huddle(home.path(), &["tools"]);
    assert!(output.status.success());
    let out = stdout(&output);
    for tool in ["claude", "pi", "opencode"] {
        assert!(out.contains(tool), "missing {} in {}", tool, out);
    }
    assert!(out.contains("messageInjection"));
}

#[test]
fn test_daemon_stop_and_status_when_not_running() {
    let home = tempfile::tempdir().unwrap();

    let status = huddle(home.path(), &["daemon", "status"]);
    assert!(status.status.success());
    assert!(stdout(&status).contains("Daemon: STOPPED"));

    let stop = huddle(home.path(), &["daemon", "stop"]);
    assert!(stop.status.success());
    assert!(stdout(&stop).contains("not running"));

    // a stale pid file is cleaned up
    std::fs::create_dir_all(home.path().join("data")).unwrap();
    std::fs::write(home.path().join("data/daemon.pid"), "999999999").unwrap();
    let stop = huddle(home.path(), &["daemon", "stop"]);
    assert!(stop.status.success());
    assert!(!home.path().join("data/daemon.pid").exists());
}

#[test]
fn test_daemon_start_status_stop() {
    let home = tempfile::tempdir().unwrap();
    let pid_file = home.path().join("data/daemon.pid");

    let started = huddle(home.path(), &["daemon", "start"]);
    assert!(started.status.success(), "{}", stderr(&started));
    assert!(pid_file.exists());

    let again = huddle(home.path(), &["daemon", "start"]);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("already running"));

    // give the daemon time to come up
    std::thread::sleep(Duration::from_millis(500));
    let status = huddle(home.path(), &["daemon", "status"]);
    assert!(stdout(&status).contains("Daemon: RUNNING"));

    let stopped = huddle(home.path(), &["daemon", "stop"]);
    assert!(stopped.status.success(), "{}", stderr(&stopped));
    assert!(stdout(&stopped).contains("Daemon stopped"));
    assert!(!pid_file.exists());
}
