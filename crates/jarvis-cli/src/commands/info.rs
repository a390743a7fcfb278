use std::collections::BTreeMap;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use serde::Serialize;

use jarvis_control::Assistant;
use jarvis_ledger::HistoryKind;

use super::{emit, load_config, print_json};

pub fn history(
    assistant: &Assistant,
    user: &str,
    kind: Option<&str>,
    limit: usize,
) -> Result<ExitCode> {
    let kind = kind
        .map(|k| k.parse::<HistoryKind>().map_err(|e| anyhow!(e)))
        .transpose()?;
    emit(&assistant.history(user, kind, limit))
}

#[derive(Serialize)]
struct ConfigReport<'a> {
    config: &'a jarvis_types::JarvisConfig,
    files: Vec<String>,
    sources: BTreeMap<String, String>,
}

pub fn show_config(path: Option<&Path>) -> Result<ExitCode> {
    let effective = load_config(path)?;
    let report = ConfigReport {
        config: &effective.config,
        files: effective
            .source_files
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        sources: effective
            .sources
            .iter()
            .map(|(field, source)| (field.clone(), source.to_string()))
            .collect(),
    };
    print_json(&report, true)
}
