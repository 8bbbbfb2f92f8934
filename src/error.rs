//! Error types for the circulation core.
//!
//! Every failure is returned synchronously to the immediate caller; the
//! core never retries internally. A zero-stock check-out that suspends is
//! not an error, it is a designed blocking wait. Busy results from
//! try-style probes are surfaced for the caller to decide on retry.

use crate::sync::{RwLockError, TryWriteError};

/// Failure taxonomy for catalog operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested title is not in the catalog.
    #[error("title not found: {0}")]
    NotFound(String),

    /// The patron attempted to return a copy they never checked out.
    #[error("{patron} has not checked out {title}")]
    NotBorrowed {
        /// Title being returned.
        title: String,
        /// Requester identity.
        patron: String,
    },

    /// A try-style probe found the catalog lock held or contended.
    #[error("catalog lock is busy")]
    LockBusy,

    /// A try-style check-out found no copies in stock. The blocking
    /// [`check_out`](crate::catalog::Catalog::check_out) would suspend
    /// instead.
    #[error("no copies of {0} available")]
    NotAvailable(String),

    /// The catalog lock was poisoned by a panic in a critical section.
    #[error("catalog lock poisoned")]
    Poisoned,
}

impl From<RwLockError> for Error {
    fn from(err: RwLockError) -> Self {
        match err {
            RwLockError::Poisoned => Self::Poisoned,
        }
    }
}

impl From<TryWriteError> for Error {
    fn from(err: TryWriteError) -> Self {
        match err {
            TryWriteError::Locked => Self::LockBusy,
            TryWriteError::Poisoned => Self::Poisoned,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
