//! History ledger for jarvis.
//!
//! Every top-level command execution, interpretation, batch and automation
//! sequence leaves one [`HistoryRecord`]. [`HistoryStore`] keeps them in
//! SQLite; [`MemoryHistory`] is used when no database is wanted.

pub mod filter;
pub mod record;
pub mod store;

use std::sync::Mutex;

use jarvis_types::ErrorKind;

pub use filter::HistoryFilter;
pub use record::{HistoryKind, HistoryRecord};
pub use store::HistoryStore;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("failed to open history ledger: {0}")]
    Open(String),

    #[error("history query failed: {0}")]
    Query(String),

    #[error("failed to encode history payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Backend
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Destination for history records.
pub trait HistorySink: Send + Sync {
    fn record(&self, record: &HistoryRecord) -> LedgerResult<()>;

    /// The last `limit` records for `user_id`, newest first.
    fn recent(
        &self,
        user_id: &str,
        kind: Option<HistoryKind>,
        limit: usize,
    ) -> LedgerResult<Vec<HistoryRecord>>;
}

/// In-process history, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HistorySink for MemoryHistory {
    fn record(&self, record: &HistoryRecord) -> LedgerResult<()> {
        self.records
            .lock()
            .map_err(|_| LedgerError::Query("history mutex poisoned".into()))?
            .push(record.clone());
        Ok(())
    }

    fn recent(
        &self,
        user_id: &str,
        kind: Option<HistoryKind>,
        limit: usize,
    ) -> LedgerResult<Vec<HistoryRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| LedgerError::Query("history mutex poisoned".into()))?;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id && kind.map_or(true, |k| r.kind == k))
            .take(limit)
            .cloned()
            .collect())
    }
}
