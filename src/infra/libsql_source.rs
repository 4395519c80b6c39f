use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use libsql::params::Params;
use libsql::{Builder, Connection, Database, Value};
use tracing::info;

use crate::app::ports::QuerySourcePort;
use crate::config::QueryConfig;
use crate::error::{ReportError, Result};
use crate::types::{Page, RawRow, RawValue, ReportRequest, RowBatch};

/// Query source backed by a remote libSQL (Turso) database.
pub struct LibsqlQuerySource {
    db: Database,
    queries: HashMap<String, QueryConfig>,
}

impl LibsqlQuerySource {
    /// Connect using `LIBSQL_URL` and `LIBSQL_AUTH_TOKEN`
    pub async fn from_env(queries: HashMap<String, QueryConfig>) -> Result<Self> {
        let url = env::var("LIBSQL_URL").map_err(|_| {
            ReportError::Config("LIBSQL_URL environment variable not set".to_string())
        })?;
        let auth_token = env::var("LIBSQL_AUTH_TOKEN").map_err(|_| {
            ReportError::Config("LIBSQL_AUTH_TOKEN environment variable not set".to_string())
        })?;

        info!("Connecting to libSQL database at {}", url);

        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| ReportError::Config(format!("Failed to connect to database: {e}")))?;

        Ok(Self { db, queries })
    }

    fn connection(&self) -> std::result::Result<Connection, String> {
        self.db
            .connect()
            .map_err(|e| format!("Failed to get database connection: {e}"))
    }

    fn query_for(&self, report: &str) -> std::result::Result<&QueryConfig, String> {
        self.queries
            .get(report)
            .ok_or_else(|| format!("no query configured for report '{report}'"))
    }
}

#[async_trait]
impl QuerySourcePort for LibsqlQuerySource {
    async fn fetch(&self, request: &ReportRequest) -> std::result::Result<RowBatch, String> {
        let query = self.query_for(&request.report)?;
        let conn = self.connection()?;

        let rows = run_query(&conn, &query.rows, Some(request.page)).await?;
        let children = match &query.children {
            Some(sql) => run_query(&conn, sql, None).await?,
            None => Vec::new(),
        };
        Ok(RowBatch { rows, children })
    }

    async fn count(&self, report: &str) -> std::result::Result<u64, String> {
        let sql = self
            .query_for(report)?
            .count
            .as_deref()
            .ok_or_else(|| format!("no count query configured for report '{report}'"))?;
        let conn = self.connection()?;

        let mut rows = conn
            .query(sql, Params::None)
            .await
            .map_err(|e| format!("Failed to run count query: {e}"))?;
        let row = rows
            .next()
            .await
            .map_err(|e| format!("Failed to read count row: {e}"))?
            .ok_or_else(|| "count query returned no rows".to_string())?;
        match row.get_value(0) {
            Ok(Value::Integer(total)) => {
                u64::try_from(total).map_err(|_| format!("negative row count {total}"))
            }
            Ok(other) => Err(format!("count query returned a non-integer value: {other:?}")),
            Err(e) => Err(format!("Failed to read count: {e}")),
        }
    }
}

/// Whether `sql` uses the named parameter `name` as a whole token, so
/// `:offset` does not match `:offset_days`.
fn declares_param(sql: &str, name: &str) -> bool {
    sql.match_indices(name).any(|(start, _)| {
        sql[start + name.len()..]
            .chars()
            .next()
            .map_or(true, |next| !(next.is_alphanumeric() || next == '_'))
    })
}

fn page_params(sql: &str, page: Option<Page>) -> Params {
    let Some(page) = page else {
        return Params::None;
    };
    let mut named = Vec::new();
    if declares_param(sql, ":offset") {
        named.push((
            ":offset".to_string(),
            Value::Integer(i64::try_from(page.offset).unwrap_or(i64::MAX)),
        ));
    }
    if declares_param(sql, ":limit") {
        named.push((
            ":limit".to_string(),
            Value::Integer(i64::try_from(page.limit).unwrap_or(i64::MAX)),
        ));
    }
    if named.is_empty() {
        Params::None
    } else {
        Params::Named(named)
    }
}

async fn run_query(
    conn: &Connection,
    sql: &str,
    page: Option<Page>,
) -> std::result::Result<Vec<RawRow>, String> {
    let mut rows = conn
        .query(sql, page_params(sql, page))
        .await
        .map_err(|e| format!("Failed to run query: {e}"))?;

    let columns: Vec<String> = (0..rows.column_count())
        .map(|i| rows.column_name(i).unwrap_or_default().to_string())
        .collect();

    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| format!("Failed to read row: {e}"))?
    {
        let mut raw = RawRow::with_capacity(columns.len());
        for (index, name) in columns.iter().enumerate() {
            let value = row
                .get_value(index as i32)
                .map_err(|e| format!("Failed to read column '{name}': {e}"))?;
            match value {
                Value::Text(text) => raw.push_text(name.clone(), &text),
                other => raw.push(name.clone(), to_raw_value(other)),
            }
        }
        out.push(raw);
    }
    Ok(out)
}

fn to_raw_value(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Integer(v) => RawValue::Integer(v),
        Value::Real(v) => RawValue::Decimal(v),
        Value::Text(text) => RawValue::String(text),
        Value::Blob(bytes) => RawValue::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
