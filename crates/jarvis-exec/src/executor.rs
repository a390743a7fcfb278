//! Policy-gated shell command executor.
//!
//! [`CommandExecutor::execute`] never fails: a denied command, a spawn
//! failure, a non-zero exit and a timeout all come back as an
//! [`ExecutionResult`] with `success = false` and an `error` message.
//!
//! 1. **Policy check** -- deny returns immediately, nothing is spawned.
//! 2. **Spawn** -- `sh -c` (or `cmd /C` on Windows) with piped output.
//! 3. **Timeout** -- on expiry the child (and on Unix its whole process
//!    group) is killed, not merely abandoned.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use jarvis_policy::PolicyEngine;
use jarvis_types::{Command, ErrorKind, ExecutorConfig, Platform};

use crate::ExecError;

// ---------------------------------------------------------------------------
// Result record
// ---------------------------------------------------------------------------

/// Outcome of one command execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    /// Captured verbatim; empty when the command never ran or timed out.
    pub stdout: String,
    pub stderr: String,
    /// Present iff the process ran to completion.
    pub exit_code: Option<i32>,
    pub command: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ExecutionResult {
    fn failed(command: &str, err: &ExecError) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            command: command.to_string(),
            timestamp: Utc::now(),
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs allowed commands through the host shell.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    policy: PolicyEngine,
    timeout: Duration,
    working_dir: Option<PathBuf>,
}

impl CommandExecutor {
    pub fn new(policy: PolicyEngine, config: &ExecutorConfig) -> Self {
        Self {
            policy,
            timeout: Duration::from_secs(config.timeout_secs),
            working_dir: config.working_dir.clone(),
        }
    }

    /// Override the wall-clock budget for each command.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Classify and run a raw command string.
    pub async fn execute(&self, command: &str) -> ExecutionResult {
        self.run(&Command::direct(command)).await
    }

    /// Classify and run a [`Command`].
    pub async fn run(&self, command: &Command) -> ExecutionResult {
        let text = command.text();

        if let Err(denied) = self.policy.check(command) {
            let err = ExecError::Denied {
                reason: denied.to_string(),
            };
            info!(command = %text, origin = %command.origin(), reason = %err, "command blocked");
            return ExecutionResult::failed(text, &err);
        }

        let result = match self.spawn_and_wait(text).await {
            Ok(result) => result,
            Err(err) => {
                if matches!(err, ExecError::Timeout { .. }) {
                    warn!(command = %text, timeout_secs = self.timeout.as_secs(), "command timed out");
                } else {
                    warn!(command = %text, error = %err, "command failed to run");
                }
                ExecutionResult::failed(text, &err)
            }
        };

        info!(
            command = %text,
            origin = %command.origin(),
            success = result.success,
            exit_code = ?result.exit_code,
            "command executed"
        );
        result
    }

    async fn spawn_and_wait(&self, text: &str) -> Result<ExecutionResult, ExecError> {
        let mut cmd = shell_command(self.policy.platform(), text);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(ExecError::Spawn)?;
        #[cfg(unix)]
        let pgid = child.id();

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(ExecError::Wait)?,
            Err(_) => {
                // Dropping the wait future dropped the child, which kills the
                // shell; the group kill reaches anything it started.
                #[cfg(unix)]
                if let Some(pgid) = pgid {
                    crate::kill_group::kill_process_group(pgid);
                }
                return Err(ExecError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = exit_code_of(&output.status);
        let success = exit_code == 0;

        let error = (!success).then(|| {
            let trimmed = stderr.trim();
            if trimmed.is_empty() {
                format!("command exited with code {exit_code}")
            } else {
                trimmed.to_string()
            }
        });

        Ok(ExecutionResult {
            success,
            stdout,
            stderr,
            exit_code: Some(exit_code),
            command: text.to_string(),
            timestamp: Utc::now(),
            error_kind: error.as_ref().map(|_| ErrorKind::Backend),
            error,
        })
    }
}

fn shell_command(platform: Platform, text: &str) -> tokio::process::Command {
    match platform {
        Platform::Windows => {
            let mut cmd = tokio::process::Command::new("cmd");
            cmd.arg("/C").arg(text);
            cmd
        }
        Platform::Unix => {
            let mut cmd = tokio::process::Command::new("sh");
            cmd.arg("-c").arg(text);
            cmd
        }
    }
}

/// Exit code, with signal deaths reported shell-style as `128 + signo`.
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn executor() -> CommandExecutor {
        CommandExecutor::new(
            PolicyEngine::for_platform(Platform::Unix),
            &ExecutorConfig::default(),
        )
    }

    #[tokio::test]
    async fn safe_command_captures_stdout() {
        let result = executor().execute("echo hello").await;
        assert!(result.success, "{result:?}");
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.exit_code, Some(0));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn denied_command_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let cmd = format!("touch {} && sudo true", marker.display());

        let result = executor().execute(&cmd).await;
        assert!(!result.success);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.error_kind, Some(ErrorKind::PolicyDenied));
        assert!(result.error.unwrap().contains("sudo"));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let result = executor()
            .execute("ls /definitely/not/a/real/path")
            .await;
        assert!(!result.success);
        assert!(matches!(result.exit_code, Some(code) if code != 0));
        assert!(!result.error.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_without_stderr_names_the_code() {
        let result = executor().execute("grep -q needle /dev/null").await;
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.error.as_deref(), Some("command exited with code 1"));
    }

    #[tokio::test]
    async fn timeout_kills_and_reports_no_exit_code() {
        let exec = executor().with_timeout(Duration::from_secs(1));
        let started = std::time::Instant::now();
        let result = exec.execute("tail -f /dev/null").await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!result.success);
        assert_eq!(result.exit_code, None);
        assert_eq!(result.error.as_deref(), Some("timed out after 1 seconds"));
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn working_dir_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExecutorConfig {
            working_dir: Some(dir.path().to_path_buf()),
            ..ExecutorConfig::default()
        };
        let exec = CommandExecutor::new(PolicyEngine::for_platform(Platform::Unix), &config);
        let result = exec.execute("pwd").await;
        assert!(result.success);
        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn result_serializes_null_exit_code() {
        let err = ExecError::Timeout { secs: 30 };
        let result = ExecutionResult::failed("tail -f x", &err);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["exit_code"].is_null());
        assert_eq!(json["error"], "timed out after 30 seconds");
        assert_eq!(json["error_kind"], "timeout");
        assert!(json["timestamp"].is_string());
    }
}
