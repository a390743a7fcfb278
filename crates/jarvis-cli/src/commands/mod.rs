//! Subcommand implementations.
//!
//! Every command prints one pretty JSON document on stdout and exits
//! non-zero when the operation reported `success: false`.

pub mod automation;
pub mod info;
pub mod shell;
pub mod voice;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::Serialize;

use jarvis_control::{Assistant, Response};
use jarvis_types::{ConfigLoader, EffectiveConfig};

pub fn load_config(path: Option<&Path>) -> Result<EffectiveConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = path {
        anyhow::ensure!(path.exists(), "config file not found: {}", path.display());
        loader = loader.with_workspace_path(path.to_path_buf());
    }
    loader.load().context("failed to load configuration")
}

pub async fn build_assistant(path: Option<&Path>, offline: bool) -> Result<Assistant> {
    let config = load_config(path)?.config;
    if offline {
        return Ok(Assistant::offline(config));
    }
    Assistant::from_config(config)
        .await
        .context("failed to start jarvis")
}

/// Print `value` and turn its success flag into the exit status.
pub fn print_json<T: Serialize>(value: &T, success: bool) -> Result<ExitCode> {
    let text = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{text}");
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn emit<T: Serialize>(response: &Response<T>) -> Result<ExitCode> {
    print_json(response, response.success)
}
