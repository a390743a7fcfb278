//! HistoryRecord: one entry per top-level assistant invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which top-level operation produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Command,
    Interpretation,
    Batch,
    Sequence,
}

impl HistoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryKind::Command => "command",
            HistoryKind::Interpretation => "interpretation",
            HistoryKind::Batch => "batch",
            HistoryKind::Sequence => "sequence",
        }
    }
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "command" => Ok(HistoryKind::Command),
            "interpretation" => Ok(HistoryKind::Interpretation),
            "batch" => Ok(HistoryKind::Batch),
            "sequence" => Ok(HistoryKind::Sequence),
            other => Err(format!(
                "unknown history kind: {other} (expected command, interpretation, batch or sequence)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    /// Caller-supplied identity.
    pub user_id: String,
    pub kind: HistoryKind,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Short human-readable description, e.g. the command line.
    pub summary: String,
    /// The full result as returned to the caller.
    pub payload: serde_json::Value,
}

impl HistoryRecord {
    /// A fresh record with a generated id, stamped now.
    pub fn new(
        user_id: impl Into<String>,
        kind: HistoryKind,
        success: bool,
        summary: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            timestamp: Utc::now(),
            success,
            summary: summary.into(),
            payload,
        }
    }
}
