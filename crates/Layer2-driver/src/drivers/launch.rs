//! Process launch and model discovery shared by every driver

use crate::capabilities::{AgentCapabilities, Capability};
use crate::error::{DriverError, Result};
use crate::r#trait::{CommandSpec, ProcessHandle, StartOptions};
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, info, warn};

/// Chatroom id exported to every agent
pub const ENV_CHATROOM_ID: &str = "HUDDLE_CHATROOM_ID";
/// Role name exported to every agent
pub const ENV_ROLE: &str = "HUDDLE_ROLE";

/// Upper bound for a model discovery command
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Tool-specific part of a launch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// Written to stdin right after spawn
    pub stdin_payload: Option<String>,
    /// Leave stdin open for later messages
    pub keep_stdin: bool,
}

/// Reject a model request on a driver that cannot select models
pub(crate) fn check_model(
    tool: &str,
    capabilities: AgentCapabilities,
    options: &StartOptions,
) -> Result<()> {
    if options.model.is_some() {
        capabilities.require(tool, Capability::ModelSelection)?;
    }
    Ok(())
}

fn log_stdio(log_path: Option<&Path>) -> std::io::Result<(Stdio, Stdio)> {
    let Some(path) = log_path else {
        return Ok((Stdio::null(), Stdio::null()));
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let out = OpenOptions::new().create(true).append(true).open(path)?;
    let err = out.try_clone()?;
    Ok((Stdio::from(out), Stdio::from(err)))
}

/// Bounded, so a tool that never reads its stdin cannot hold up the caller
async fn write_payload(
    stdin: &mut ChildStdin,
    payload: &str,
    timeout: Duration,
) -> std::result::Result<(), String> {
    let write = async {
        stdin.write_all(payload.as_bytes()).await?;
        stdin.flush().await
    };
    match tokio::time::timeout(timeout, write).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("stdin not drained within {:?}", timeout)),
    }
}

/// Spawn `spec` with `invocation` as the leader of a new process group
pub(crate) async fn launch(
    tool: &str,
    spec: &CommandSpec,
    invocation: Invocation,
    options: &StartOptions,
) -> Result<ProcessHandle> {
    let (stdout, stderr) = log_stdio(options.log_path.as_deref()).map_err(|e| {
        let path = options.log_path.as_deref().unwrap_or(Path::new("-"));
        DriverError::spawn(tool, format!("log {}: {}", path.display(), e))
    })?;
    let wants_stdin = invocation.stdin_payload.is_some() || invocation.keep_stdin;

    let mut cmd = Command::new(&spec.program);
    cmd.args(&invocation.args)
        .args(&spec.extra_args)
        .env(ENV_CHATROOM_ID, options.chatroom_id.as_str())
        .env(ENV_ROLE, options.role.as_str())
        .envs(invocation.env)
        .envs(&spec.env)
        .stdin(if wants_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(false);

    if let Some(dir) = &options.workdir {
        cmd.current_dir(dir);
    }

    // pgid == pid, so a group signal reaches everything the agent forks
    #[cfg(unix)]
    cmd.process_group(0);

    debug!(tool, program = %spec.program.display(), "Spawning agent");
    let mut child = cmd
        .spawn()
        .map_err(|e| DriverError::spawn(tool, format!("{}: {}", spec.program.display(), e)))?;

    let Some(pid) = child.id() else {
        return Err(DriverError::spawn(tool, "process exited before its pid was read"));
    };

    let mut stdin = child.stdin.take();
    if let (Some(payload), Some(pipe)) = (invocation.stdin_payload.as_deref(), stdin.as_mut()) {
        if let Err(e) = write_payload(pipe, payload, options.stdin_timeout).await {
            warn!(tool, pid, "Prompt write failed, killing agent: {}", e);
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(DriverError::spawn(tool, format!("failed to write prompt: {}", e)));
        }
    }
    if !invocation.keep_stdin {
        stdin = None;
    }

    info!(
        tool,
        pid,
        role = %options.role,
        chatroom = %options.chatroom_id,
        "Agent process started"
    );

    Ok(ProcessHandle {
        pid,
        tool: tool.to_string(),
        child,
        stdin,
    })
}

/// One model id per line; blank lines and `#` comments skipped, the first
/// whitespace-separated token kept, duplicates dropped
pub fn parse_model_list(output: &str) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(id) = line.split_whitespace().next() {
            if !models.iter().any(|m| m == id) {
                models.push(id.to_string());
            }
        }
    }
    models
}

/// Run the discovery command, bounded by `timeout`
pub(crate) async fn discover_models(
    tool: &str,
    spec: &CommandSpec,
    args: &[&str],
    timeout: Duration,
) -> Result<Vec<String>> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| DriverError::discovery(tool, format!("timed out after {:?}", timeout)))?
        .map_err(|e| DriverError::discovery(tool, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DriverError::discovery(
            tool,
            format!("{}: {}", output.status, stderr.trim()),
        ));
    }

    let models = parse_model_list(&String::from_utf8_lossy(&output.stdout));
    debug!(tool, count = models.len(), "Discovered models");
    Ok(models)
}

/// Static list unless the driver declares dynamic discovery
pub(crate) async fn list_models(
    tool: &str,
    capabilities: AgentCapabilities,
    spec: &CommandSpec,
    discovery_args: &[&str],
    static_models: &[&str],
) -> Result<Vec<String>> {
    if !capabilities.dynamic_model_discovery {
        return Ok(static_models.iter().map(|m| m.to_string()).collect());
    }
    discover_models(tool, spec, discovery_args, DISCOVERY_TIMEOUT).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_list() {
        let out = "# available\nanthropic/claude-sonnet  (default)\n\nopenai/gpt-5\nopenai/gpt-5\n";
        assert_eq!(
            parse_model_list(out),
            vec!["anthropic/claude-sonnet", "openai/gpt-5"]
        );
        assert!(parse_model_list("\n  \n").is_empty());
    }

    #[tokio::test]
    async fn test_static_models_without_discovery() {
        let spec = CommandSpec {
            program: "/nonexistent/huddle-tool".into(),
            extra_args: Vec::new(),
            env: Default::default(),
        };
        let models = list_models(
            "fake",
            AgentCapabilities::none(),
            &spec,
            &["models"],
            &["a", "b"],
        )
        .await
        .unwrap();
        assert_eq!(models, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_discovery_missing_program_fails() {
        let spec = CommandSpec {
            program: "/nonexistent/huddle-tool".into(),
            extra_args: Vec::new(),
            env: Default::default(),
        };
        let err = discover_models("fake", &spec, &["models"], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::ModelDiscovery { .. }));
    }

    #[tokio::test]
    async fn test_unopenable_log_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let spec = CommandSpec {
            program: "true".into(),
            extra_args: Vec::new(),
            env: Default::default(),
        };
        let options = StartOptions::new("room".into(), huddle_foundation::Role::Builder)
            .with_log_path(blocker.join("room-builder.log"));
        let err = launch("fake", &spec, Invocation::default(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_launch_missing_program_is_spawn_error() {
        let spec = CommandSpec {
            program: "/nonexistent/huddle-tool".into(),
            extra_args: Vec::new(),
            env: Default::default(),
        };
        let options = StartOptions::new("room".into(), huddle_foundation::Role::Builder);
        let err = launch("fake", &spec, Invocation::default(), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::Spawn { .. }));
    }
}
