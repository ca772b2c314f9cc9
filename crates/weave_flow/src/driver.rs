//! The database contract.
//!
//! The evaluator needs very little from a database: a factory that opens
//! connections, and per-connection query/exec. Row iteration details stay
//! on the adapter side; an adapter reads all rows into a byte-preserving
//! [`ResultSet`] using the driver's textual encoding, so that digests and
//! text dumps are deterministic regardless of server settings.

use weave_common::SqlError;
use weave_resultset::{ExecSummary, ResultSet};

/// Connection factory. One evaluation opens one connection per session and
/// keeps it for the whole run.
pub trait Driver: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Conn>, SqlError>;
}

/// A single database connection, owned by one session.
///
/// Statement errors are reported as [`SqlError`] with the database's own
/// error number where one exists; they are carried in the statement's
/// `Return` event and never abort an evaluation.
pub trait Conn: Send {
    /// Execute a result-producing statement and read all rows.
    fn query(&mut self, sql: &str) -> Result<ResultSet, SqlError>;

    /// Execute a non-query statement.
    fn exec(&mut self, sql: &str) -> Result<ExecSummary, SqlError>;

    /// Release the connection. Called once at pool shutdown.
    fn close(&mut self) -> Result<(), SqlError>;
}
