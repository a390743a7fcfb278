use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use jarvis_control::Assistant;
use jarvis_toolkit::sequence::parse_sequence;
use jarvis_toolkit::RawAction;

use super::{emit, print_json};

/// Run the sequence stored in `file`.
pub async fn sequence(assistant: &Assistant, user: &str, file: &Path) -> Result<ExitCode> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read sequence file {}", file.display()))?;
    let (name, actions) = parse_sequence(&text)?;
    let name = name.or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    });

    let result = assistant.run_sequence(user, name.as_deref(), actions).await;
    print_json(&result, result.success)
}

pub async fn action(assistant: &Assistant, kind: &str, params: &str) -> Result<ExitCode> {
    let params: serde_json::Value =
        serde_json::from_str(params).context("--params must be a JSON object")?;
    anyhow::ensure!(params.is_object(), "--params must be a JSON object");
    emit(&assistant.perform_action(RawAction::new(kind, params)).await)
}
