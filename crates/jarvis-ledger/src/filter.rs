//! Composable filter for history queries.
//!
//! Builds a parameterized SQL WHERE clause from optional criteria. All
//! filters are AND-combined; `None` fields are ignored.

use chrono::{DateTime, Utc};

use crate::record::HistoryKind;

/// Use `Default::default()` for an empty filter (matches everything).
#[derive(Debug, Default, Clone)]
pub struct HistoryFilter {
    pub user_id: Option<String>,
    pub kind: Option<HistoryKind>,
    pub success: Option<bool>,
    /// Only records at or after this timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive substring of the summary.
    pub summary_contains: Option<String>,
    pub limit: Option<usize>,
}

/// A built SQL fragment with its positional parameters.
pub(crate) struct SqlFragment {
    /// The WHERE clause (without the keyword), or empty.
    pub where_clause: String,
    pub params: Vec<Box<dyn rusqlite::types::ToSql>>,
    pub limit: Option<usize>,
}

impl HistoryFilter {
    /// Records of one user and, optionally, one kind.
    pub fn for_user(user_id: impl Into<String>, kind: Option<HistoryKind>, limit: usize) -> Self {
        Self {
            user_id: Some(user_id.into()),
            kind,
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub(crate) fn to_sql(&self) -> SqlFragment {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref user_id) = self.user_id {
            params.push(Box::new(user_id.clone()));
            conditions.push(format!("user_id = ?{}", params.len()));
        }
        if let Some(kind) = self.kind {
            params.push(Box::new(kind.as_str()));
            conditions.push(format!("kind = ?{}", params.len()));
        }
        if let Some(success) = self.success {
            params.push(Box::new(success));
            conditions.push(format!("success = ?{}", params.len()));
        }
        if let Some(ref since) = self.since {
            params.push(Box::new(since.to_rfc3339()));
            conditions.push(format!("timestamp >= ?{}", params.len()));
        }
        if let Some(ref needle) = self.summary_contains {
            params.push(Box::new(needle.clone()));
            conditions.push(format!("summary LIKE '%' || ?{} || '%'", params.len()));
        }

        SqlFragment {
            where_clause: conditions.join(" AND "),
            params,
            limit: self.limit,
        }
    }
}
