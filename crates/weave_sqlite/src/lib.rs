//! SQLite adapter for the database contract.
//!
//! Each session gets its own connection to a shared on-disk database, so
//! writer conflicts genuinely block: the busy handler makes a second
//! writer wait instead of failing, which is exactly what the evaluator's
//! block detection needs. Cells are read through SQLite's value API and
//! rendered in the textual protocol (integers and reals as their decimal
//! text), keeping digests and dumps deterministic.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use weave_common::SqlError;
use weave_flow::driver::{Conn, Driver};
use weave_resultset::{ColumnDef, ExecSummary, ResultSet};

/// How long a connection waits on a locked database before giving up.
/// Large on purpose: the harness, not SQLite, decides what "blocked"
/// means.
const BUSY_TIMEOUT: Duration = Duration::from_secs(600);

pub struct SqliteDriver {
    path: PathBuf,
}

impl SqliteDriver {
    pub fn open(path: impl AsRef<Path>) -> Self {
        SqliteDriver {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse a `sqlite:<path>` data source name.
    pub fn from_dsn(dsn: &str) -> Option<Self> {
        let rest = dsn.strip_prefix("sqlite:")?;
        let path = rest.strip_prefix("//").unwrap_or(rest);
        if path.is_empty() {
            return None;
        }
        Some(SqliteDriver::open(path))
    }
}

impl Driver for SqliteDriver {
    fn connect(&self) -> Result<Box<dyn Conn>, SqlError> {
        let conn = Connection::open(&self.path).map_err(map_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_err)?;
        debug!(path = %self.path.display(), "sqlite connection opened");
        Ok(Box::new(SqliteConn { conn }))
    }
}

pub struct SqliteConn {
    conn: Connection,
}

impl Conn for SqliteConn {
    fn query(&mut self, sql: &str) -> Result<ResultSet, SqlError> {
        let mut stmt = self.conn.prepare(sql).map_err(map_err)?;
        let cols: Vec<ColumnDef> = stmt
            .columns()
            .iter()
            .map(|c| ColumnDef::new(c.name(), c.decl_type().unwrap_or("")))
            .collect();
        let width = cols.len();
        let mut rs = ResultSet::new(cols);

        let mut rows = stmt.query([]).map_err(map_err)?;
        while let Some(row) = rows.next().map_err(map_err)? {
            let mut cells = Vec::with_capacity(width);
            for j in 0..width {
                let cell = match row.get_ref(j).map_err(map_err)? {
                    ValueRef::Null => None,
                    ValueRef::Integer(v) => Some(v.to_string().into_bytes()),
                    ValueRef::Real(v) => Some(format_real(v).into_bytes()),
                    ValueRef::Text(t) => Some(t.to_vec()),
                    ValueRef::Blob(b) => Some(b.to_vec()),
                };
                cells.push(cell);
            }
            rs.push_row(cells);
        }
        Ok(rs)
    }

    fn exec(&mut self, sql: &str) -> Result<ExecSummary, SqlError> {
        let affected = self.conn.execute(sql, []).map_err(map_err)?;
        Ok(ExecSummary {
            rows_affected: Some(affected as i64),
            last_insert_id: Some(self.conn.last_insert_rowid()),
        })
    }

    fn close(&mut self) -> Result<(), SqlError> {
        // The handle closes when dropped; flush errors surface there.
        Ok(())
    }
}

/// SQLite's text rendering keeps a trailing `.0` on integral reals.
fn format_real(v: f64) -> String {
    if v.is_finite() && v == v.trunc() {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

fn map_err(err: rusqlite::Error) -> SqlError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) => SqlError::db(
            e.extended_code,
            msg.clone().unwrap_or_else(|| e.to_string()),
        ),
        rusqlite::Error::SqlInputError { error, .. } => {
            SqlError::db(error.extended_code, err.to_string())
        }
        other => SqlError::harness(other.to_string()),
    }
}
