use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{Connection, InterruptHandle, Row, params_from_iter};
use sightline_core::error::{Result, SightlineError};
use sightline_core::query::StatusResponse;
use tracing::{debug, error, warn};

use crate::schema::SCHEMA_SQL;
use crate::sql::BuiltQuery;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SightlineError::Io(format!("failed to create db dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| SightlineError::Db(format!("failed to open duckdb: {e}")))?;
        conn.execute_batch("PRAGMA threads=4;")
            .map_err(|e| SightlineError::Db(format!("failed to set pragmas: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| SightlineError::Db(format!("failed to initialize schema: {e}")))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: path.display().to_string(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SightlineError::Db(format!("failed to open in-memory db: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| SightlineError::Db(format!("failed to initialize schema: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: ":memory:".to_string(),
        })
    }

    /// Opens another connection to the same database. Queries on the returned
    /// store never wait on this store's connection lock, and the handle
    /// cancels whatever statement is running on it.
    pub fn session(&self) -> Result<(Self, Arc<InterruptHandle>)> {
        let conn = self
            .conn()?
            .try_clone()
            .map_err(|e| SightlineError::Db(format!("failed to open session: {e}")))?;
        let interrupt = conn.interrupt_handle();
        Ok((
            Self {
                conn: Arc::new(Mutex::new(conn)),
                db_path: self.db_path.clone(),
            },
            interrupt,
        ))
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SightlineError::Db("store connection lock poisoned".to_string()))
    }

    /// Runs one SELECT and maps every row. The statement and its row cursor
    /// live only for this call. Driver failures are logged in full but only
    /// the operation name reaches the caller; a row the mapper rejects is
    /// logged and skipped.
    pub fn fetch<T, F>(&self, op: &'static str, query: &BuiltQuery, map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> duckdb::Result<T>,
    {
        let conn = self.conn()?;
        debug!(op, sql = %query.sql, params = query.params.len(), "running query");

        let mut stmt = conn
            .prepare(&query.sql)
            .map_err(|e| driver_failure(op, "prepare", e))?;
        let rows = stmt
            .query_map(params_from_iter(query.params.iter()), map)
            .map_err(|e| driver_failure(op, "execute", e))?;

        let mut out = Vec::new();
        for (idx, row) in rows.enumerate() {
            match row {
                Ok(v) => out.push(v),
                Err(e) => warn!(op, row = idx, error = %e, "skipping unreadable row"),
            }
        }
        Ok(out)
    }

    pub fn status(&self) -> Result<StatusResponse> {
        let conn = self.conn()?;

        let issues_count = scalar_u64(&conn, "SELECT COUNT(*) FROM issue")?;
        let incidents_count = scalar_u64(&conn, "SELECT COUNT(DISTINCT trace_id) FROM incident")?;
        let spans_count = scalar_u64(&conn, "SELECT COUNT(*) FROM span")?;

        let oldest_span = scalar_ts(&conn, "SELECT MIN(start_time) FROM span")?;
        let newest_span = scalar_ts(&conn, "SELECT MAX(start_time) FROM span")?;

        let db_size_bytes = if self.db_path == ":memory:" {
            0
        } else {
            fs::metadata(&self.db_path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StatusResponse {
            db_path: self.db_path.clone(),
            db_size_bytes,
            issues_count,
            incidents_count,
            spans_count,
            oldest_span,
            newest_span,
        })
    }
}

fn driver_failure(op: &'static str, stage: &'static str, e: duckdb::Error) -> SightlineError {
    error!(op, stage, error = %e, "query failed");
    SightlineError::Db(format!("{op} failed"))
}

fn scalar_u64(conn: &Connection, sql: &str) -> Result<u64> {
    conn.query_row(sql, [], |row| row.get::<_, i64>(0))
        .map(|v| v.max(0) as u64)
        .map_err(|e| SightlineError::Db(format!("query failed: {e}")))
}

fn scalar_ts(conn: &Connection, sql: &str) -> Result<Option<DateTime<Utc>>> {
    conn.query_row(sql, [], |row| row.get::<_, Option<NaiveDateTime>>(0))
        .map(|opt| opt.map(|dt| dt.and_utc()))
        .map_err(|e| SightlineError::Db(format!("query failed: {e}")))
}
