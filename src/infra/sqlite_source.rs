use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, InterruptHandle, Statement};
use tracing::{debug, info, warn};

use crate::app::ports::QuerySourcePort;
use crate::config::QueryConfig;
use crate::types::{Page, RawRow, RawValue, ReportRequest, RowBatch};

/// Query source backed by a local SQLite database file.
///
/// SQLite has no temporal column types, so text that looks like an ISO date,
/// time or date-time is resolved to the native tag on the way in.
///
/// A query whose caller stops waiting (a timeout drops the future) is
/// interrupted so the connection is released for the next request.
pub struct SqliteQuerySource {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    queries: Arc<HashMap<String, QueryConfig>>,
}

impl SqliteQuerySource {
    pub fn open<P: AsRef<Path>>(
        path: P,
        queries: HashMap<String, QueryConfig>,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("sqlite database '{}' does not exist", path.display());
        }
        let conn = Connection::open(path)?;
        info!("Opened sqlite report source at {}", path.display());
        Ok(Self::from_connection(conn, queries))
    }

    pub fn from_connection(conn: Connection, queries: HashMap<String, QueryConfig>) -> Self {
        Self {
            interrupt: Arc::new(conn.get_interrupt_handle()),
            conn: Arc::new(Mutex::new(conn)),
            queries: Arc::new(queries),
        }
    }

    fn query_for(&self, report: &str) -> Result<QueryConfig, String> {
        self.queries
            .get(report)
            .cloned()
            .ok_or_else(|| format!("no query configured for report '{report}'"))
    }
}

#[async_trait]
impl QuerySourcePort for SqliteQuerySource {
    async fn fetch(&self, request: &ReportRequest) -> Result<RowBatch, String> {
        let query = self.query_for(&request.report)?;
        let conn = Arc::clone(&self.conn);
        let page = request.page;

        let guard = InterruptOnDrop::arm(&self.interrupt, &request.report);
        let joined = tokio::task::spawn_blocking(move || -> Result<RowBatch, String> {
            let conn = conn
                .lock()
                .map_err(|_| "sqlite connection lock poisoned".to_string())?;
            let rows = run_query(&conn, &query.rows, Some(page)).map_err(|e| e.to_string())?;
            let children = match &query.children {
                Some(sql) => run_query(&conn, sql, None).map_err(|e| e.to_string())?,
                None => Vec::new(),
            };
            debug!(rows = rows.len(), children = children.len(), "sqlite query finished");
            Ok(RowBatch { rows, children })
        })
        .await;
        guard.disarm();
        joined.map_err(|e| format!("sqlite worker failed: {e}"))?
    }

    async fn count(&self, report: &str) -> Result<u64, String> {
        let sql = self
            .query_for(report)?
            .count
            .ok_or_else(|| format!("no count query configured for report '{report}'"))?;
        let conn = Arc::clone(&self.conn);

        let guard = InterruptOnDrop::arm(&self.interrupt, report);
        let joined = tokio::task::spawn_blocking(move || -> Result<u64, String> {
            let conn = conn
                .lock()
                .map_err(|_| "sqlite connection lock poisoned".to_string())?;
            let total: i64 = conn
                .query_row(&sql, [], |row| row.get(0))
                .map_err(|e| e.to_string())?;
            u64::try_from(total).map_err(|_| format!("negative row count {total}"))
        })
        .await;
        guard.disarm();
        joined.map_err(|e| format!("sqlite worker failed: {e}"))?
    }
}

/// Interrupts the running statement when dropped while still armed, i.e.
/// when the awaiting future was cancelled before the worker finished.
struct InterruptOnDrop<'a> {
    handle: &'a InterruptHandle,
    report: &'a str,
    armed: bool,
}

impl<'a> InterruptOnDrop<'a> {
    fn arm(handle: &'a InterruptHandle, report: &'a str) -> Self {
        Self {
            handle,
            report,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InterruptOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(report = self.report, "abandoned sqlite query interrupted");
            self.handle.interrupt();
        }
    }
}

/// Run `sql`, binding `:offset` and `:limit` when the statement declares them.
fn run_query(conn: &Connection, sql: &str, page: Option<Page>) -> rusqlite::Result<Vec<RawRow>> {
    let mut stmt = conn.prepare(sql)?;
    if let Some(page) = page {
        bind_page(&mut stmt, page)?;
    }

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut raw = RawRow::with_capacity(columns.len());
        for (index, name) in columns.iter().enumerate() {
            match row.get_ref(index)? {
                ValueRef::Text(bytes) => raw.push_text(name.clone(), &String::from_utf8_lossy(bytes)),
                other => raw.push(name.clone(), to_raw_value(other)),
            }
        }
        out.push(raw);
    }
    Ok(out)
}

fn bind_page(stmt: &mut Statement<'_>, page: Page) -> rusqlite::Result<()> {
    let offset = i64::try_from(page.offset).unwrap_or(i64::MAX);
    let limit = i64::try_from(page.limit).unwrap_or(i64::MAX);
    if let Some(index) = stmt.parameter_index(":offset")? {
        stmt.raw_bind_parameter(index, offset)?;
    }
    if let Some(index) = stmt.parameter_index(":limit")? {
        stmt.raw_bind_parameter(index, limit)?;
    }
    Ok(())
}

fn to_raw_value(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null => RawValue::Null,
        ValueRef::Integer(v) => RawValue::Integer(v),
        ValueRef::Real(v) => RawValue::Decimal(v),
        ValueRef::Text(bytes) => RawValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => RawValue::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}
