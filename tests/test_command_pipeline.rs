//! Policy classification and command execution across crates.

mod common;

use std::time::Duration;

use jarvis_exec::CommandExecutor;
use jarvis_policy::PolicyEngine;
use jarvis_types::{ErrorKind, ExecutorConfig, Platform};

fn unix_executor() -> CommandExecutor {
    CommandExecutor::new(PolicyEngine::for_platform(Platform::Unix), &ExecutorConfig::default())
}

#[test]
fn denylist_wins_regardless_of_case_and_padding() {
    let engine = PolicyEngine::for_platform(Platform::Unix);
    for command in [
        "rm -rf /tmp/x",
        "  RM -RF /  ",
        "ls && sudo reboot",
        "echo hi; SHUTDOWN now",
        "find / -name x | xargs kill -9",
    ] {
        let verdict = engine.classify(command);
        assert!(!verdict.allowed, "{command} should be denied");
        assert!(verdict.reason.starts_with("blocked dangerous command pattern"));
    }
}

#[test]
fn unknown_first_token_cites_the_token() {
    let engine = PolicyEngine::for_platform(Platform::Unix);
    let verdict = engine.classify("python3 -c 'print(1)'");
    assert!(!verdict.allowed);
    assert_eq!(verdict.reason, "command 'python3' not in whitelist");
}

#[test]
fn classification_is_deterministic() {
    let engine = PolicyEngine::for_platform(Platform::Windows);
    let first = engine.classify("dir C:\\");
    for _ in 0..10 {
        assert_eq!(engine.classify("dir C:\\"), first);
    }
    assert!(first.allowed);
}

#[tokio::test]
async fn denied_command_never_spawns() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("created");
    let result = unix_executor()
        .execute(&format!("touch {} && sudo true", marker.display()))
        .await;
    assert!(!result.success);
    assert_eq!(result.exit_code, None);
    assert_eq!(result.error_kind, Some(ErrorKind::PolicyDenied));
    assert!(!marker.exists());
}

#[cfg(unix)]
#[tokio::test]
async fn safe_diagnostic_command_succeeds() {
    let result = unix_executor().execute("date").await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.exit_code, Some(0));
    assert!(!result.stdout.trim().is_empty());
    assert!(result.error.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn runaway_command_is_killed_at_timeout() {
    let executor = unix_executor().with_timeout(Duration::from_secs(1));
    let started = std::time::Instant::now();
    let result = executor.execute("tail -f /dev/null").await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!result.success);
    assert_eq!(result.exit_code, None);
    assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    assert!(result.error.unwrap().contains("timed out after 1 seconds"));
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_reports_exit_code_and_stderr() {
    let result = unix_executor().execute("ls /definitely/not/here").await;
    assert!(!result.success);
    assert!(matches!(result.exit_code, Some(code) if code != 0));
    assert!(!result.error.unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn batch_continues_past_failures() {
    let batch = unix_executor()
        .execute_batch("mixed", &["echo one", "reboot", "", "echo two"])
        .await;
    assert_eq!(batch.total_commands, 3);
    assert_eq!(batch.successful_commands, 2);
    assert!(!batch.results[1].success);
    assert_eq!(batch.results[2].stdout.trim(), "two");
}

#[tokio::test]
async fn assistant_lists_safe_commands_and_templates() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = common::offline_assistant(dir.path());

    let safe = assistant.safe_commands().data.unwrap();
    assert_eq!(safe.platform, Platform::Unix);
    let names: Vec<_> = safe.commands.iter().map(|c| c.name.as_str()).collect();
    assert!(names.contains(&"ls"));
    assert!(!names.iter().any(|n| n.contains("sudo") || n.contains("rm -rf")));

    let templates = assistant.list_templates().data.unwrap();
    assert!(templates.templates.iter().any(|t| t.name == "system_info"));
}
