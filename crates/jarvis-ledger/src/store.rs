//! HistoryStore: SQLite-backed append-only history of assistant invocations.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use tracing::{debug, info};
use uuid::Uuid;

use crate::filter::HistoryFilter;
use crate::record::{HistoryKind, HistoryRecord};
use crate::{HistorySink, LedgerError, LedgerResult};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        record_id TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        success INTEGER NOT NULL,
        summary TEXT NOT NULL,
        payload TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_history_user ON history(user_id);
    CREATE INDEX IF NOT EXISTS idx_history_kind ON history(kind);
    CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);";

const COLUMNS: &str = "record_id, user_id, kind, timestamp, success, summary, payload";

/// Append-only history ledger.
///
/// The connection sits behind a mutex so the store can be shared between
/// tasks as a [`HistorySink`].
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the ledger at `path`, creating parent directories.
    ///
    /// Enables WAL mode and creates the table and indices if missing.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Open(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| LedgerError::Open(format!("failed to open database: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| LedgerError::Open(format!("failed to set WAL mode: {e}")))?;
        let store = Self::init(conn)?;
        info!(path = %path.display(), "history store opened");
        Ok(store)
    }

    /// A throwaway ledger that lives only as long as the store.
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LedgerError::Open(format!("failed to open in-memory database: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> LedgerResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| LedgerError::Open(format!("failed to create schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Query("connection mutex poisoned".into()))
    }

    /// Store one record.
    pub fn append(&self, record: &HistoryRecord) -> LedgerResult<()> {
        let payload = serde_json::to_string(&record.payload)?;
        self.conn()?
            .execute(
                "INSERT INTO history (record_id, user_id, kind, timestamp, success, summary, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id.to_string(),
                    record.user_id,
                    record.kind.as_str(),
                    record.timestamp.to_rfc3339(),
                    record.success,
                    record.summary,
                    payload,
                ],
            )
            .map_err(|e| LedgerError::Query(format!("failed to insert record: {e}")))?;
        debug!(id = %record.id, kind = %record.kind, user = %record.user_id, "history record stored");
        Ok(())
    }

    /// Records matching `filter`, newest first.
    pub fn query(&self, filter: &HistoryFilter) -> LedgerResult<Vec<HistoryRecord>> {
        let fragment = filter.to_sql();
        let mut sql = format!("SELECT {COLUMNS} FROM history");
        if !fragment.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&fragment.where_clause);
        }
        sql.push_str(" ORDER BY id DESC");
        if let Some(limit) = fragment.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LedgerError::Query(format!("query prepare failed: {e}")))?;
        let params: Vec<&dyn rusqlite::types::ToSql> =
            fragment.params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(params.as_slice(), row_to_record)
            .map_err(|e| LedgerError::Query(format!("query failed: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| LedgerError::Query(format!("query read failed: {e}")))
    }

    /// The last `limit` records for `user_id`, optionally of one kind, newest first.
    pub fn recent(
        &self,
        user_id: &str,
        kind: Option<HistoryKind>,
        limit: usize,
    ) -> LedgerResult<Vec<HistoryRecord>> {
        self.query(&HistoryFilter::for_user(user_id, kind, limit))
    }

    pub fn count(&self) -> LedgerResult<usize> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM history", [], |row| row.get::<_, i64>(0))
            .map(|c| c as usize)
            .map_err(|e| LedgerError::Query(format!("count failed: {e}")))
    }
}

impl HistorySink for HistoryStore {
    fn record(&self, record: &HistoryRecord) -> LedgerResult<()> {
        self.append(record)
    }

    fn recent(
        &self,
        user_id: &str,
        kind: Option<HistoryKind>,
        limit: usize,
    ) -> LedgerResult<Vec<HistoryRecord>> {
        HistoryStore::recent(self, user_id, kind, limit)
    }
}

fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let id = Uuid::parse_str(&row.get::<_, String>(0)?).map_err(|e| conversion(0, e))?;
    let kind = row
        .get::<_, String>(2)?
        .parse::<HistoryKind>()
        .map_err(|e| conversion(2, LedgerError::Query(e)))?;
    let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&row.get::<_, String>(3)?)
        .map_err(|e| conversion(3, e))?
        .with_timezone(&Utc);
    let payload =
        serde_json::from_str(&row.get::<_, String>(6)?).map_err(|e| conversion(6, e))?;

    Ok(HistoryRecord {
        id,
        user_id: row.get(1)?,
        kind,
        timestamp,
        success: row.get(4)?,
        summary: row.get(5)?,
        payload,
    })
}
