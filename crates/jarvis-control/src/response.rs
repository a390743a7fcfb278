//! Response envelope and the report types carried inside it.
//!
//! Every operation answers with at least `{success, timestamp}`; failures
//! add `error` and `error_kind`. Operation-specific fields are flattened
//! into the same object.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use jarvis_exec::{ExecutionResult, TemplateInfo};
use jarvis_interpret::Interpretation;
use jarvis_ledger::HistoryRecord;
use jarvis_policy::SafeCommand;
use jarvis_toolkit::{Match, WindowInfo};
use jarvis_types::{ErrorKind, Platform};
use jarvis_voice::WakeStatus;

#[derive(Debug, Clone, Serialize)]
pub struct Response<T> {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            timestamp: Utc::now(),
            error: None,
            error_kind: None,
            data: Some(data),
        }
    }

    pub fn fail(error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            success: false,
            timestamp: Utc::now(),
            error: Some(error.into()),
            error_kind: Some(kind),
            data: None,
        }
    }
}

/// Which step of the natural-language pipeline produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Interpretation,
    Execution,
}

/// Interpret-then-execute outcome.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub stage: Stage,
    pub interpretation: Interpretation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafeCommandList {
    pub platform: Platform,
    pub commands: Vec<SafeCommand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateList {
    pub platform: Platform,
    pub templates: Vec<TemplateInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotReport {
    pub path: PathBuf,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    /// Base64 PNG, only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

/// A single automation action run outside a sequence.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub action_type: String,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchList {
    pub template: String,
    pub matches: Vec<Match>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WindowList {
    pub windows: Vec<WindowInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryReport {
    pub user_id: String,
    pub records: Vec<HistoryRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub version: &'static str,
    pub platform: Platform,
    pub toolkit_backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
    pub interpreter: &'static str,
    pub wake: WakeStatus,
}
