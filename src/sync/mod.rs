//! Synchronization primitives for the circulation core.
//!
//! # Primitives
//!
//! - [`RwLock`]: Read-write lock with writer-preference fairness
//! - [`ReentrantLock`]: Recursive lock for compound multi-step updates
//! - [`Notify`]: Blocking "wait until predicate" signaling
//!
//! All primitives are guard-based: acquisition returns a guard whose drop
//! releases, so release counts balance on every exit path. The lock state
//! (counters and flags) always lives behind a private mutex separate from
//! the data it governs.

mod notify;
mod reentrant;
mod rwlock;

pub use notify::Notify;
pub use reentrant::{ReentrantGuard, ReentrantLock};
pub use rwlock::{
    RwLock, RwLockError, RwLockReadGuard, RwLockWriteGuard, TryReadError, TryWriteError,
};
