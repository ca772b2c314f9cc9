//! A scripted in-process database used to exercise the evaluator.
//!
//! Statements are tiny commands rather than real SQL, just enough to make
//! sessions genuinely block on each other:
//!
//! - `begin` / `commit` / `rollback` — transaction scope for key locks
//! - `update <key>` — take the named key lock, waiting while another
//!   connection holds it (released at commit, or immediately outside a
//!   transaction)
//! - `select sleep(<ms>)` — a query that takes that long and returns `0`
//! - `select <expr>` — a one-row, one-column result echoing `<expr>`
//! - `fail <code> <msg>` — a statement error with a database code
//! - anything else — a no-op exec
//!
//! The session marker comment produced by the script parser is ignored.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use weave_common::SqlError;
use weave_flow::driver::{Conn, Driver};
use weave_resultset::{ColumnDef, ExecSummary, ResultSet};

#[derive(Default)]
struct LockTable {
    owners: Mutex<HashMap<String, usize>>,
    released: Condvar,
}

pub struct ScriptedDriver {
    locks: Arc<LockTable>,
    next_conn: AtomicUsize,
    /// When set, `connect` fails with this error.
    pub connect_error: Option<SqlError>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        ScriptedDriver {
            locks: Arc::new(LockTable::default()),
            next_conn: AtomicUsize::new(1),
            connect_error: None,
        }
    }
}

impl Driver for ScriptedDriver {
    fn connect(&self) -> Result<Box<dyn Conn>, SqlError> {
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        Ok(Box::new(ScriptedConn {
            id: self.next_conn.fetch_add(1, Ordering::SeqCst),
            locks: self.locks.clone(),
            in_txn: false,
            held: HashSet::new(),
        }))
    }
}

pub struct ScriptedConn {
    id: usize,
    locks: Arc<LockTable>,
    in_txn: bool,
    held: HashSet<String>,
}

impl ScriptedConn {
    fn acquire(&mut self, key: &str) {
        let mut owners = self.locks.owners.lock();
        loop {
            match owners.get(key) {
                Some(owner) if *owner != self.id => self.locks.released.wait(&mut owners),
                _ => break,
            }
        }
        owners.insert(key.to_string(), self.id);
        self.held.insert(key.to_string());
    }

    fn release_all(&mut self) {
        let mut owners = self.locks.owners.lock();
        for key in self.held.drain() {
            if owners.get(&key) == Some(&self.id) {
                owners.remove(&key);
            }
        }
        self.locks.released.notify_all();
    }
}

/// Drop the `/* session */` marker comment the parser keeps in the SQL.
fn strip_marker(sql: &str) -> &str {
    match sql.find("*/") {
        Some(pos) if sql.trim_start().starts_with("/*") => sql[pos + 2..].trim(),
        _ => sql.trim(),
    }
}

fn one_cell(name: &str, value: &str) -> ResultSet {
    let mut rs = ResultSet::new(vec![ColumnDef::new(name, "TEXT")]);
    rs.push_row(vec![Some(value.as_bytes().to_vec())]);
    rs
}

impl Conn for ScriptedConn {
    fn query(&mut self, sql: &str) -> Result<ResultSet, SqlError> {
        let cmd = strip_marker(sql);
        if let Some(rest) = cmd.strip_prefix("select sleep(") {
            let ms: u64 = rest
                .trim_end_matches(')')
                .parse()
                .map_err(|_| SqlError::harness(format!("bad sleep: {cmd}")))?;
            thread::sleep(Duration::from_millis(ms));
            return Ok(one_cell(cmd, "0"));
        }
        if let Some(rest) = cmd.strip_prefix("fail ") {
            return Err(parse_fail(rest));
        }
        if let Some(expr) = cmd.strip_prefix("select ") {
            return Ok(one_cell(expr, expr));
        }
        Err(SqlError::harness(format!("not a query: {cmd}")))
    }

    fn exec(&mut self, sql: &str) -> Result<ExecSummary, SqlError> {
        let cmd = strip_marker(sql);
        if cmd == "begin" {
            self.in_txn = true;
            return Ok(ExecSummary {
                rows_affected: Some(0),
                last_insert_id: None,
            });
        }
        if cmd == "commit" || cmd == "rollback" {
            self.in_txn = false;
            self.release_all();
            return Ok(ExecSummary {
                rows_affected: Some(0),
                last_insert_id: None,
            });
        }
        if let Some(key) = cmd.strip_prefix("update ") {
            self.acquire(key.trim());
            if !self.in_txn {
                self.release_all();
            }
            return Ok(ExecSummary {
                rows_affected: Some(1),
                last_insert_id: None,
            });
        }
        if let Some(rest) = cmd.strip_prefix("fail ") {
            return Err(parse_fail(rest));
        }
        Ok(ExecSummary {
            rows_affected: Some(0),
            last_insert_id: None,
        })
    }

    fn close(&mut self) -> Result<(), SqlError> {
        self.release_all();
        Ok(())
    }
}

fn parse_fail(rest: &str) -> SqlError {
    let mut parts = rest.splitn(2, ' ');
    let code = parts.next().and_then(|c| c.parse().ok()).unwrap_or(-1);
    let message = parts.next().unwrap_or("scripted failure").to_string();
    SqlError { code, message }
}

impl Drop for ScriptedConn {
    fn drop(&mut self) {
        self.release_all();
    }
}
