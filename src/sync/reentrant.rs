//! Reentrant lock with owner-thread-plus-depth accounting.
//!
//! A thread already holding the lock may reacquire it without
//! self-deadlocking, which lets a compound multi-step update call helper
//! operations that each take the lock themselves. Releases happen on guard
//! drop, so acquisition and release counts balance exactly on every exit
//! path, including early failure returns.

use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};

#[derive(Debug, Default)]
struct ReentrantState {
    owner: Option<ThreadId>,
    depth: u32,
}

/// A recursive mutual-exclusion lock.
///
/// The owning thread may nest [`ReentrantLock::lock`] calls arbitrarily;
/// other threads block until the owner's depth returns to zero.
///
/// # Example
///
/// ```
/// use circulation::sync::ReentrantLock;
///
/// let lock = ReentrantLock::new();
/// let outer = lock.lock();
/// let inner = lock.lock(); // same thread: no deadlock
/// drop(inner);
/// drop(outer); // fully released here
/// ```
#[derive(Debug, Default)]
pub struct ReentrantLock {
    state: Mutex<ReentrantState>,
    cv: Condvar,
}

impl ReentrantLock {
    /// Creates a new, unheld lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, blocking if another thread holds it.
    ///
    /// Reacquisition by the owning thread increments the depth and returns
    /// immediately.
    pub fn lock(&self) -> ReentrantGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock().expect("reentrant state poisoned");
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    break;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    break;
                }
                Some(_) => {
                    tracing::trace!("reentrant lock contended, blocking");
                    state = self.cv.wait(state).expect("reentrant state poisoned");
                }
            }
        }
        drop(state);
        ReentrantGuard { lock: self }
    }

    /// Returns true if the calling thread currently holds the lock.
    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        let state = self.state.lock().expect("reentrant state poisoned");
        state.owner == Some(thread::current().id())
    }

    fn release(&self) {
        let mut state = self.state.lock().expect("reentrant state poisoned");
        debug_assert_eq!(state.owner, Some(thread::current().id()));
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.owner = None;
            drop(state);
            self.cv.notify_all();
        }
    }
}

/// Guard for a held [`ReentrantLock`]; one level of depth is released on
/// drop.
#[must_use = "guard will be immediately released if not held"]
pub struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
