//! The session-interleaving evaluator.
//!
//! The main loop is strictly single-threaded: it walks the pending list
//! head-to-tail, advances the first statement that can be advanced, and
//! restarts from the head after every completion. Actual SQL I/O happens
//! on one background thread per in-flight statement; the thread owns the
//! session's borrowed connection, returns it when the statement finishes,
//! and signals completion through a one-shot bounded channel. "Blocked"
//! is inferred purely from the block-time clock elapsing without
//! completion, which works against any database and any driver.

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{bounded, select, Receiver};
use tracing::{debug, warn};

use weave_common::{CancelToken, EvalError, PoolError};
use weave_resultset::ResultSet;

use crate::driver::Driver;
use crate::event::{Event, Return};
use crate::pool::{BorrowedConn, SessionPool};
use crate::stmt::Stmt;

/// Scheduler timeouts and knobs. `None` means wait indefinitely, which
/// batch runners use when the database is known to be unblocked.
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    /// Max synchronous wait for a freshly invoked statement before the
    /// evaluator declares it blocked.
    pub block_time: Option<Duration>,
    /// Polling slice per pass for statements that are already running.
    pub ping_time: Option<Duration>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            block_time: Some(Duration::from_secs(3)),
            ping_time: Some(Duration::from_millis(200)),
        }
    }
}

/// Handle over the evaluation's connections, returned even when the run
/// itself failed so that callers can always drain and release.
pub struct EvalHandle {
    pool: SessionPool,
}

impl EvalHandle {
    /// Block until every in-flight statement task has returned its
    /// connection.
    pub fn wait(&self) {
        self.pool.wait();
    }

    /// Close all session connections. Call after `wait`.
    pub fn close(&self) {
        if let Err(e) = self.pool.close() {
            warn!(error = %e, "closing session connections");
        }
    }
}

/// Evaluate statements and drain before returning.
///
/// Convenience wrapper over [`eval`]: waits for in-flight tasks and closes
/// the connections regardless of the outcome.
pub fn run(
    driver: &dyn Driver,
    stmts: &[Stmt],
    opts: &EvalOptions,
    cancel: &CancelToken,
    on_event: impl FnMut(&Event),
) -> Result<(), EvalError> {
    let (handle, result) = eval(driver, stmts, opts, cancel, on_event);
    handle.wait();
    handle.close();
    result
}

/// Evaluate statements, delivering events through `on_event`.
///
/// Runs the cooperative loop to completion (or failure) synchronously.
/// The returned handle still owns connections and possibly in-flight
/// tasks; callers must `wait()` and `close()` it, even on error.
pub fn eval(
    driver: &dyn Driver,
    stmts: &[Stmt],
    opts: &EvalOptions,
    cancel: &CancelToken,
    mut on_event: impl FnMut(&Event),
) -> (EvalHandle, Result<(), EvalError>) {
    let pool = SessionPool::new();
    let handle_result = init_sessions(driver, stmts, &pool);
    let handle = EvalHandle { pool: pool.clone() };
    if let Err(e) = handle_result {
        handle.close();
        return (handle, Err(e));
    }

    let mut nodes: Vec<Node> = stmts
        .iter()
        .map(|s| Node {
            stmt: s.clone(),
            state: NodeState::Pending,
            waited: false,
        })
        .collect();

    let result = eval_loop(&pool, &mut nodes, opts, cancel, &mut on_event);
    (handle, result)
}

/// Acquire one connection per distinct session, in input order.
fn init_sessions(
    driver: &dyn Driver,
    stmts: &[Stmt],
    pool: &SessionPool,
) -> Result<(), EvalError> {
    let mut seen = HashSet::new();
    for stmt in stmts {
        if seen.insert(stmt.session.clone()) {
            let conn = driver.connect().map_err(|source| EvalError::Connect {
                session: stmt.session.clone(),
                source,
            })?;
            pool.put(&stmt.session, conn)?;
            debug!(session = %stmt.session, "session connection opened");
        }
    }
    Ok(())
}

enum NodeState {
    /// Never executed. Completed nodes are removed from the list outright,
    /// so no terminal state exists here.
    Pending,
    /// Execution in flight on the session's borrowed connection.
    Running(StmtFuture),
}

struct Node {
    stmt: Stmt,
    state: NodeState,
    waited: bool,
}

/// What the pass decided to do with the node at the cursor.
enum Step {
    /// The node has never run; admit it if its connection is free.
    Start,
    /// The node is already running and was polled for one slice.
    Polled(Poll),
}

fn eval_loop(
    pool: &SessionPool,
    nodes: &mut Vec<Node>,
    opts: &EvalOptions,
    cancel: &CancelToken,
    on_event: &mut impl FnMut(&Event),
) -> Result<(), EvalError> {
    while !nodes.is_empty() {
        let mut i = 0;
        while i < nodes.len() {
            let step = match &nodes[i].state {
                NodeState::Pending => Step::Start,
                NodeState::Running(future) => Step::Polled(future.poll(opts.ping_time, cancel)),
            };
            match step {
                Step::Start => {
                    let stmt = nodes[i].stmt.clone();
                    if stmt.is_wait() && !nodes[i].waited {
                        // Barrier: no session may have a statement still in
                        // flight before this one starts.
                        wait_for_drain(pool, cancel)?;
                        nodes[i].waited = true;
                        break; // restart the pass
                    }
                    let borrowed = match pool.borrow(&stmt.session) {
                        Ok(b) => b,
                        Err(PoolError::ConnBorrowed) => {
                            // A previous statement on this session is still
                            // running; try the next node.
                            i += 1;
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };
                    on_event(&Event::invoke(stmt.clone()));
                    let future = spawn_statement(stmt.clone(), borrowed);
                    match future.poll(opts.block_time, cancel) {
                        Poll::Ready(ret) => {
                            on_event(&Event::ret(ret));
                            nodes.remove(i);
                            break;
                        }
                        Poll::Timeout => {
                            debug!(session = %stmt.session, sql = %stmt.sql, "statement blocked");
                            on_event(&Event::block(stmt.session.as_str()));
                            nodes[i].state = NodeState::Running(future);
                            break;
                        }
                        Poll::Cancelled => return Err(EvalError::Cancelled),
                    }
                }
                Step::Polled(Poll::Ready(ret)) => {
                    on_event(&Event::resume(nodes[i].stmt.session.as_str()));
                    on_event(&Event::ret(ret));
                    nodes.remove(i);
                    break;
                }
                Step::Polled(Poll::Timeout) => {
                    i += 1;
                }
                Step::Polled(Poll::Cancelled) => return Err(EvalError::Cancelled),
            }
        }
    }
    Ok(())
}

/// Race `pool.wait()` against cancellation.
fn wait_for_drain(pool: &SessionPool, cancel: &CancelToken) -> Result<(), EvalError> {
    let (tx, rx) = bounded::<()>(1);
    let pool = pool.clone();
    thread::spawn(move || {
        pool.wait();
        let _ = tx.send(());
    });
    let stop = cancel.observer();
    select! {
        recv(rx) -> _ => Ok(()),
        recv(stop) -> _ => Err(EvalError::Cancelled),
    }
}

enum Poll {
    Ready(Return),
    Timeout,
    Cancelled,
}

/// One-shot completion signal of an in-flight statement task.
struct StmtFuture {
    stmt: Stmt,
    rx: Receiver<Return>,
}

impl StmtFuture {
    /// Wait up to `timeout` (forever when `None`) for completion.
    fn poll(&self, timeout: Option<Duration>, cancel: &CancelToken) -> Poll {
        let stop = cancel.observer();
        match timeout {
            Some(d) => select! {
                recv(self.rx) -> msg => self.settle(msg),
                recv(stop) -> _ => Poll::Cancelled,
                default(d) => Poll::Timeout,
            },
            None => select! {
                recv(self.rx) -> msg => self.settle(msg),
                recv(stop) -> _ => Poll::Cancelled,
            },
        }
    }

    fn settle(&self, msg: Result<Return, crossbeam_channel::RecvError>) -> Poll {
        match msg {
            Ok(ret) => Poll::Ready(ret),
            // The task died without reporting; surface it as a statement
            // error so the run can keep its pairing guarantees.
            Err(_) => {
                let now = SystemTime::now();
                Poll::Ready(Return {
                    stmt: self.stmt.clone(),
                    outcome: Err(weave_common::SqlError::harness(
                        "statement task aborted before reporting",
                    )),
                    t: [now, now],
                })
            }
        }
    }
}

/// Start executing a statement on its borrowed connection.
///
/// The spawned thread is the connection's sole owner until it finishes;
/// it returns the connection to the pool first and reports the outcome
/// second, so a session's next statement can always be admitted once its
/// predecessor's `Return` has been observed.
fn spawn_statement(stmt: Stmt, mut borrowed: BorrowedConn) -> StmtFuture {
    let (tx, rx) = bounded::<Return>(1);
    let future = StmtFuture {
        stmt: stmt.clone(),
        rx,
    };
    let spawned = thread::Builder::new()
        .name(format!("weave-stmt-{}", stmt.session))
        .spawn(move || {
            let t0 = SystemTime::now();
            let outcome = borrowed.with_conn(|conn| {
                if stmt.is_query() {
                    conn.query(&stmt.sql)
                } else {
                    conn.exec(&stmt.sql).map(ResultSet::from_exec)
                }
            });
            let ret = Return {
                stmt,
                outcome,
                t: [t0, SystemTime::now()],
            };
            drop(borrowed);
            let _ = tx.send(ret);
        });
    if let Err(e) = spawned {
        // The closure (and the borrowed connection with it) is dropped,
        // which returns the connection; the disconnected channel then
        // surfaces a harness error through `settle`.
        warn!(error = %e, "spawning statement task failed");
    }
    future
}
