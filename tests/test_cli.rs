//! End-to-end tests that invoke the `jarvis` binary.
//!
//! HOME and the working directory point at a temp directory so no real
//! config is read, and `--offline` keeps screen, audio and network out of
//! the picture.
//!
//! The binary is built on first use:
//!   cargo build -p jarvis-cli && cargo test --test test_cli

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Once;

static BUILD_ONCE: Once = Once::new();

/// Ensure the jarvis binary is built, then return its path.
fn jarvis_bin() -> PathBuf {
    let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("tests/ should have a parent")
        .to_path_buf();

    BUILD_ONCE.call_once(|| {
        let status = std::process::Command::new("cargo")
            .args(["build", "-p", "jarvis-cli"])
            .current_dir(&workspace_root)
            .status()
            .expect("failed to invoke cargo build");
        assert!(status.success(), "cargo build -p jarvis-cli failed");
    });

    let bin = workspace_root.join("target").join("debug").join("jarvis");
    assert!(bin.exists(), "jarvis binary not found at {}", bin.display());
    bin
}

/// Offline `jarvis` pinned to the Unix tables, isolated in `home`.
fn jarvis_cmd(home: &Path) -> Command {
    let config = home.join("jarvis.toml");
    std::fs::write(
        &config,
        format!(
            "[policy]\nplatform = \"unix\"\n\n[toolkit]\nscreenshot_dir = \"{}\"\n",
            home.join("shots").display()
        ),
    )
    .expect("write config");

    let mut cmd = Command::new(jarvis_bin());
    cmd.env("HOME", home)
        .env_remove("JARVIS_POLICY_PLATFORM")
        .env_remove("JARVIS_TOOLKIT_BACKEND")
        .current_dir(home)
        .arg("--offline")
        .arg("--config")
        .arg(&config);
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn safe_commands_lists_allowed_verbs() {
    let home = tempfile::tempdir().unwrap();
    let output = jarvis_cmd(home.path())
        .arg("safe-commands")
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["platform"], "unix");
    let names: Vec<_> = json["commands"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert!(names.contains(&"uname"));
    assert!(!names.contains(&"sudo"));
}

#[test]
fn denied_command_exits_non_zero() {
    let home = tempfile::tempdir().unwrap();
    jarvis_cmd(home.path())
        .args(["exec", "rm -rf /"])
        .assert()
        .failure()
        .stdout(
            predicate::str::contains("policy_denied")
                .and(predicate::str::contains("blocked dangerous command pattern: rm -rf")),
        );
}

#[test]
fn interpret_uses_fallback_phrases() {
    let home = tempfile::tempdir().unwrap();
    let output = jarvis_cmd(home.path())
        .args(["interpret", "what", "time", "is", "it"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["command"], "date");
    assert_eq!(json["method"], "fallback_exact");
}

#[test]
fn status_reports_offline_backends() {
    let home = tempfile::tempdir().unwrap();
    let output = jarvis_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["toolkit_backend"], "simulated");
    assert_eq!(json["interpreter"], "fallback");
    assert_eq!(json["wake"]["available"], false);
    assert!(json["screen_width"].as_u64().unwrap() > 0);
}

#[test]
fn screenshot_writes_png_into_configured_directory() {
    let home = tempfile::tempdir().unwrap();
    jarvis_cmd(home.path())
        .args(["screenshot", "--output", "cli.png", "--region", "0,0,32,16"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"width\": 32"));
    assert!(home.path().join("shots").join("cli.png").exists());
}

#[test]
fn unknown_action_type_is_reported() {
    let home = tempfile::tempdir().unwrap();
    jarvis_cmd(home.path())
        .args(["action", "teleport"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown_action_type"));
}

#[test]
fn config_shows_where_settings_came_from() {
    let home = tempfile::tempdir().unwrap();
    let output = jarvis_cmd(home.path())
        .arg("config")
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["config"]["policy"]["platform"], "unix");
    assert!(json["sources"]["policy.platform"]
        .as_str()
        .unwrap()
        .starts_with("workspace file"));
    assert_eq!(json["files"].as_array().unwrap().len(), 1);
}

#[test]
fn sequence_file_runs_until_first_failure() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("login.json");
    std::fs::write(
        &file,
        r#"[
            {"type": "click", "params": {"x": 10, "y": 10}},
            {"type": "click", "params": {"x": 5000, "y": 10}},
            {"type": "key", "params": {"key_combination": "enter"}}
        ]"#,
    )
    .unwrap();

    let output = jarvis_cmd(home.path())
        .arg("sequence")
        .arg(&file)
        .assert()
        .failure()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["total"], 3);
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["steps"].as_array().unwrap().len(), 2);
    assert_eq!(json["steps"][1]["error_kind"], "out_of_bounds");
}
