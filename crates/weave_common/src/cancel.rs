//! Cooperative cancellation for bounded waits.
//!
//! The evaluator's main loop only ever blocks on channel selects with a
//! timeout; `CancelToken` gives every one of those waits a second receiver
//! that becomes ready the moment `cancel()` is called, so a cancelled
//! evaluation wakes immediately instead of waiting out its timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

/// A clonable cancellation signal.
///
/// Cancellation is level-triggered and permanent: once `cancel()` has been
/// called, every existing and future [`CancelToken::observer`] receiver is
/// ready, and `is_cancelled()` returns true forever after.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    flag: AtomicBool,
    // Dropping the sender disconnects every observer receiver, which is
    // what makes `select!` arms on the observer fire.
    keeper: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        CancelToken {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                keeper: Mutex::new(Some(tx)),
                rx,
            }),
        }
    }

    /// Signal cancellation. Idempotent; wakes all observers immediately.
    pub fn cancel(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.keeper.lock().take();
    }

    /// Check whether cancellation has been requested (non-blocking).
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// A receiver that becomes ready (disconnected) once the token is
    /// cancelled. Intended for `select!` arms next to a bounded wait.
    pub fn observer(&self) -> Receiver<()> {
        self.inner.rx.clone()
    }

    /// Cancel this token after `timeout` elapses, from a detached thread.
    /// Used by batch runners to bound a whole script evaluation.
    pub fn cancel_after(&self, timeout: Duration) {
        let token = self.clone();
        thread::spawn(move || {
            thread::sleep(timeout);
            token.cancel();
        });
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::select;
    use std::time::Instant;

    #[test]
    fn test_token_starts_live() {
        let t = CancelToken::new();
        assert!(!t.is_cancelled());
    }

    #[test]
    fn test_cancel_is_sticky_and_shared() {
        let t1 = CancelToken::new();
        let t2 = t1.clone();
        t1.cancel();
        t1.cancel();
        assert!(t2.is_cancelled());
    }

    #[test]
    fn test_observer_fires_on_cancel() {
        let t = CancelToken::new();
        let obs = t.observer();
        t.cancel();
        let fired = select! {
            recv(obs) -> _ => true,
            default(Duration::from_millis(100)) => false,
        };
        assert!(fired, "observer should be ready after cancel");
    }

    #[test]
    fn test_observer_silent_while_live() {
        let t = CancelToken::new();
        let obs = t.observer();
        let fired = select! {
            recv(obs) -> _ => true,
            default(Duration::from_millis(20)) => false,
        };
        assert!(!fired, "observer must not fire before cancel");
    }

    #[test]
    fn test_cancel_wakes_waiter_quickly() {
        let t = CancelToken::new();
        let obs = t.observer();
        let t2 = t.clone();
        let h = thread::spawn(move || {
            let start = Instant::now();
            select! {
                recv(obs) -> _ => {}
            }
            start.elapsed()
        });
        thread::sleep(Duration::from_millis(20));
        t2.cancel();
        let waited = h.join().unwrap();
        assert!(waited < Duration::from_secs(1), "woke in {:?}", waited);
    }
}
