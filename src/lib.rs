//! Circulation: a thread-safe lending core for shared inventories.
//!
//! # Overview
//!
//! Circulation is the concurrency heart of a lending system: many threads
//! check items out, return them, and edit the catalog against one shared
//! inventory. Correctness is structural, not conventional. Every
//! acquisition returns a guard whose drop releases, every blocking wait
//! re-checks its predicate, and every failure is a typed error returned to
//! the immediate caller.
//!
//! # Core Guarantees
//!
//! - **Writer preference**: A pending catalog writer blocks new readers, so
//!   edits cannot starve under a steady reader stream
//! - **Blocking check-out**: Zero stock suspends the borrower until a copy
//!   returns; exactly one suspended borrower wins each returned copy
//! - **No lost wakeups**: Returns broadcast under the notify mutex, and
//!   waiters re-evaluate stock before every sleep
//! - **Balanced release**: Guards release on every exit path, panics
//!   included; a panic inside a critical section poisons the lock
//!
//! # Module Structure
//!
//! - [`sync`]: Writer-preference [`RwLock`], [`ReentrantLock`], and
//!   [`Notify`] primitives
//! - [`catalog`]: The shared inventory and its circulation operations
//! - [`desk`]: Synchronous request/receipt surface over the catalog
//! - [`diagnostics`]: Best-effort lock probes and the resource monitor
//! - [`error`]: Failure taxonomy
//! - [`test_utils`]: Logging setup and assertion macros for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]

pub mod catalog;
pub mod desk;
pub mod diagnostics;
pub mod error;
pub mod sync;
pub mod test_utils;

// Re-exports for convenient access to core types
pub use catalog::{Catalog, ItemEdit, ItemSummary};
pub use desk::{Desk, OperationKind, Receipt, Request};
pub use diagnostics::{probe_write, LockProbe, MonitorSnapshot, ResourceMonitor, ResourceStatus};
pub use error::{Error, Result};
pub use sync::{
    Notify, ReentrantGuard, ReentrantLock, RwLock, RwLockError, RwLockReadGuard, RwLockWriteGuard,
    TryReadError, TryWriteError,
};
