//! Fixed-roster session pool.
//!
//! One connection per session for the lifetime of an evaluation. `borrow`
//! is advisory: it never waits, it reports `ConnBorrowed` so the scheduler
//! can skip ahead. Every borrow is paired with exactly one return (the
//! borrowed handle gives its connection back on drop), and `wait` blocks
//! until no borrow is outstanding.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

use weave_common::{PoolError, SqlError};

use crate::driver::Conn;

const EXIST: u8 = 1 << 0;
const IN_USE: u8 = 1 << 1;

struct Slot {
    // Physically absent while borrowed; the flag word tracks intent.
    conn: Option<Box<dyn Conn>>,
    flags: u8,
}

struct PoolInner {
    slots: Mutex<HashMap<String, Slot>>,
    outstanding: Mutex<usize>,
    drained: Condvar,
}

/// Mapping from session name to its dedicated connection.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl SessionPool {
    pub fn new() -> Self {
        SessionPool {
            inner: Arc::new(PoolInner {
                slots: Mutex::new(HashMap::new()),
                outstanding: Mutex::new(0),
                drained: Condvar::new(),
            }),
        }
    }

    /// Register a session's connection. Fails if the session already has one.
    pub fn put(&self, session: &str, conn: Box<dyn Conn>) -> Result<(), PoolError> {
        let mut slots = self.inner.slots.lock();
        if slots.contains_key(session) {
            return Err(PoolError::ConnExists);
        }
        slots.insert(
            session.to_string(),
            Slot {
                conn: Some(conn),
                flags: EXIST,
            },
        );
        Ok(())
    }

    /// Take the session's connection for exclusive use.
    ///
    /// Never waits: if the connection is already out, `ConnBorrowed` tells
    /// the caller to come back later.
    pub fn borrow(&self, session: &str) -> Result<BorrowedConn, PoolError> {
        let mut slots = self.inner.slots.lock();
        let slot = slots.get_mut(session).ok_or(PoolError::ConnNotExists)?;
        if slot.flags & IN_USE != 0 {
            return Err(PoolError::ConnBorrowed);
        }
        let conn = slot.conn.take().ok_or(PoolError::ConnNotExists)?;
        slot.flags |= IN_USE;
        drop(slots);

        *self.inner.outstanding.lock() += 1;
        Ok(BorrowedConn {
            conn: Some(conn),
            session: session.to_string(),
            pool: self.clone(),
        })
    }

    /// Block until every borrowed connection has been returned.
    pub fn wait(&self) {
        let mut n = self.inner.outstanding.lock();
        while *n > 0 {
            self.inner.drained.wait(&mut n);
        }
    }

    /// Close every registered connection and drop the roster.
    ///
    /// Connections currently borrowed are simply forgotten here; they are
    /// dropped when their task finishes and finds the session gone.
    /// Returns the first close error, if any.
    pub fn close(&self) -> Result<(), SqlError> {
        let mut slots = self.inner.slots.lock();
        let mut first_err = None;
        for (_, mut slot) in slots.drain() {
            if let Some(mut conn) = slot.conn.take() {
                if let Err(e) = conn.close() {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn release(&self, session: &str, conn: Box<dyn Conn>) -> Result<(), PoolError> {
        let mut slots = self.inner.slots.lock();
        let result = match slots.get_mut(session) {
            Some(slot) if slot.flags & EXIST != 0 => {
                slot.flags &= !IN_USE;
                slot.conn = Some(conn);
                Ok(())
            }
            // Pool already closed; the connection is dropped with us.
            _ => Err(PoolError::ConnNotExists),
        };
        drop(slots);

        let mut n = self.inner.outstanding.lock();
        *n = n.saturating_sub(1);
        self.inner.drained.notify_all();
        result
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive handle on a session's connection.
///
/// The connection travels with the handle into the statement task and goes
/// back to the pool when the handle drops, success or failure.
pub struct BorrowedConn {
    conn: Option<Box<dyn Conn>>,
    session: String,
    pool: SessionPool,
}

impl BorrowedConn {
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Run `f` against the connection.
    pub fn with_conn<R>(&mut self, f: impl FnOnce(&mut dyn Conn) -> R) -> R {
        let conn = self
            .conn
            .as_mut()
            .expect("borrowed connection is present until drop");
        f(conn.as_mut())
    }
}

impl Drop for BorrowedConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.pool.release(&self.session, conn) {
                tracing::debug!(session = %self.session, error = %e, "return after pool close");
            }
        }
    }
}
