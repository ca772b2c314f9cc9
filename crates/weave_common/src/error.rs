use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenience alias for `Result<T, WeaveError>`.
pub type WeaveResult<T> = Result<T, WeaveError>;

/// A statement-level error as it appears on the wire.
///
/// The code carries the database's own error number when the failure came
/// from the server (e.g. a MySQL-style 1205 lock wait timeout). Harness and
/// driver failures that have no database number use `HARNESS_ERROR` (-1).
/// "No error" is encoded as code 0 with message `"ok"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlError {
    pub code: i32,
    pub message: String,
}

/// Code used for errors that did not originate in the database.
pub const HARNESS_ERROR: i32 = -1;

impl SqlError {
    /// The "no error" value: code 0, message "ok".
    pub fn ok() -> Self {
        SqlError {
            code: 0,
            message: "ok".to_string(),
        }
    }

    /// A database error with its server-assigned number.
    pub fn db(code: i32, message: impl Into<String>) -> Self {
        SqlError {
            code,
            message: message.into(),
        }
    }

    /// A harness/driver error with no database number.
    pub fn harness(message: impl Into<String>) -> Self {
        SqlError {
            code: HARNESS_ERROR,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code == 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "E{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for SqlError {}

/// Session pool faults.
///
/// `Borrowed` is a scheduling signal rather than a failure: the evaluator
/// skips ahead when a session's connection is already in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("connection exist")]
    ConnExists,

    #[error("connection not exist")]
    ConnNotExists,

    #[error("connection borrowed")]
    ConnBorrowed,
}

/// Faults that abort an evaluation.
///
/// Statement-level SQL errors are *not* represented here; they travel in
/// the statement's `Return` event and never stop the evaluator.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// A session connection could not be opened during initialization.
    #[error("open connection for session {session:?}: {source}")]
    Connect {
        session: String,
        #[source]
        source: SqlError,
    },

    /// A pool invariant was violated mid-evaluation.
    #[error("session pool: {0}")]
    Pool(#[from] PoolError),

    /// The caller's cancellation signal fired.
    #[error("evaluation cancelled")]
    Cancelled,
}

/// Top-level error that the crate-specific errors convert into.
#[derive(Debug, Error)]
pub enum WeaveError {
    #[error("eval error: {0}")]
    Eval(#[from] EvalError),

    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("sql error: {0}")]
    Sql(#[from] SqlError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
