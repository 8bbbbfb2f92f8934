//! Read-write lock with writer-preference fairness.
//!
//! This RwLock allows multiple readers or a single writer. Guards release
//! on drop, so acquisition and release stay balanced on every exit path.
//!
//! # Writer-Preference Fairness
//!
//! When a writer is waiting, new read requests are blocked until the writer
//! acquires and releases the lock. This prevents writer starvation under
//! heavy read load, but can cause reader starvation under heavy write load.
//!
//! | Scenario                  | Behavior                                      |
//! |---------------------------|-----------------------------------------------|
//! | No writers waiting        | Readers acquire immediately                   |
//! | Writer waiting            | New readers blocked until writer completes    |
//! | Existing readers + writer | Writer waits for all readers to release       |
//! | Multiple writers          | No order guaranteed among waiting writers     |
//!
//! # Example
//!
//! ```
//! use circulation::sync::RwLock;
//!
//! let lock = RwLock::new(vec![1, 2, 3]);
//!
//! // Multiple readers can hold the lock concurrently.
//! let read1 = lock.read().unwrap();
//! let read2 = lock.read().unwrap();
//! drop((read1, read2));
//!
//! // Writers get exclusive access.
//! let mut write = lock.write().unwrap();
//! write.push(4);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex as StdMutex, RwLock as StdRwLock};

/// Error returned when acquiring a read or write lock fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RwLockError {
    /// The lock was poisoned (a panic occurred while holding a guard).
    Poisoned,
}

impl std::fmt::Display for RwLockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poisoned => write!(f, "rwlock poisoned"),
        }
    }
}

impl std::error::Error for RwLockError {}

/// Error returned when trying to read without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryReadError {
    /// The lock is currently write-locked or a writer is waiting.
    Locked,
    /// The lock was poisoned.
    Poisoned,
}

impl std::fmt::Display for TryReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "rwlock is write-locked"),
            Self::Poisoned => write!(f, "rwlock poisoned"),
        }
    }
}

impl std::error::Error for TryReadError {}

/// Error returned when trying to write without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryWriteError {
    /// The lock is currently held by readers or a writer, or its state
    /// mutex is contended.
    Locked,
    /// The lock was poisoned.
    Poisoned,
}

impl std::fmt::Display for TryWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "rwlock is locked"),
            Self::Poisoned => write!(f, "rwlock poisoned"),
        }
    }
}

impl std::error::Error for TryWriteError {}

#[derive(Debug, Default, Clone)]
pub(crate) struct State {
    pub(crate) readers: usize,
    pub(crate) writer_active: bool,
    pub(crate) writer_waiters: usize,
}

/// A read-write lock with writer-preference fairness.
///
/// Multiple readers may access the data concurrently, or a single writer
/// may have exclusive access. When a writer is waiting, new read attempts
/// block, bounding writer wait time against an unbounded stream of new
/// readers.
///
/// # Invariants
///
/// - `writer_active` implies `readers == 0`.
/// - `readers > 0` implies `!writer_active`.
///
/// The counters live behind a private mutex separate from the data they
/// govern, so the lock never contends with itself when probing state.
///
/// # Poisoning
///
/// If a panic occurs while holding a guard, the lock is poisoned.
/// Subsequent acquisition attempts return `Poisoned`.
#[derive(Debug)]
pub struct RwLock<T> {
    state: StdMutex<State>,
    reader_cv: Condvar,
    writer_cv: Condvar,
    data: StdRwLock<T>,
    poisoned: AtomicBool,
}

impl<T: Default> Default for RwLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> RwLock<T> {
    /// Creates a new lock containing the given value.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            state: StdMutex::new(State::default()),
            reader_cv: Condvar::new(),
            writer_cv: Condvar::new(),
            data: StdRwLock::new(value),
            poisoned: AtomicBool::new(false),
        }
    }

    /// Consumes the lock and returns the inner value.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.data.into_inner().expect("rwlock poisoned")
    }

    /// Returns true if the lock is poisoned.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// Acquires a read guard, blocking while a writer is active or waiting.
    ///
    /// New readers never overtake a pending writer.
    ///
    /// # Errors
    ///
    /// Returns `RwLockError::Poisoned` if the lock is poisoned.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>, RwLockError> {
        self.acquire_read_state()?;

        match self.data.read() {
            Ok(guard) => Ok(RwLockReadGuard { lock: self, guard }),
            Err(poisoned) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_reader();
                drop(poisoned.into_inner());
                Err(RwLockError::Poisoned)
            }
        }
    }

    /// Tries to acquire a read guard without waiting.
    ///
    /// # Errors
    ///
    /// Returns `TryReadError::Locked` if a writer is active or waiting.
    pub fn try_read(&self) -> Result<RwLockReadGuard<'_, T>, TryReadError> {
        self.try_acquire_read_state()?;

        match self.data.read() {
            Ok(guard) => Ok(RwLockReadGuard { lock: self, guard }),
            Err(poisoned) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_reader();
                drop(poisoned.into_inner());
                Err(TryReadError::Poisoned)
            }
        }
    }

    /// Acquires a write guard, blocking until all readers and any active
    /// writer have released.
    ///
    /// # Errors
    ///
    /// Returns `RwLockError::Poisoned` if the lock is poisoned.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>, RwLockError> {
        self.acquire_write_state()?;

        match self.data.write() {
            Ok(guard) => Ok(RwLockWriteGuard { lock: self, guard }),
            Err(poisoned) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_writer();
                drop(poisoned.into_inner());
                Err(RwLockError::Poisoned)
            }
        }
    }

    /// Tries to acquire a write guard without waiting.
    ///
    /// This never blocks the caller: the internal state mutex is probed
    /// with `try_lock`, so even a contended state mutex reports `Locked`
    /// with no side effects.
    ///
    /// # Errors
    ///
    /// Returns `TryWriteError::Locked` if any reader or writer is active
    /// or the state mutex is contended.
    pub fn try_write(&self) -> Result<RwLockWriteGuard<'_, T>, TryWriteError> {
        self.try_acquire_write_state()?;

        match self.data.write() {
            Ok(guard) => Ok(RwLockWriteGuard { lock: self, guard }),
            Err(poisoned) => {
                self.poisoned.store(true, Ordering::Release);
                self.release_writer();
                drop(poisoned.into_inner());
                Err(TryWriteError::Poisoned)
            }
        }
    }

    /// Returns a mutable reference to the inner value.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut().expect("rwlock poisoned")
    }

    fn acquire_read_state(&self) -> Result<(), RwLockError> {
        if self.is_poisoned() {
            return Err(RwLockError::Poisoned);
        }

        let mut state = self.state.lock().expect("rwlock state poisoned");

        loop {
            if self.is_poisoned() {
                return Err(RwLockError::Poisoned);
            }

            if !state.writer_active && state.writer_waiters == 0 {
                state.readers += 1;
                return Ok(());
            }

            tracing::trace!(
                readers = state.readers,
                writer_waiters = state.writer_waiters,
                writer_active = state.writer_active,
                "reader blocked"
            );
            state = self.reader_cv.wait(state).expect("rwlock state poisoned");
        }
    }

    fn try_acquire_read_state(&self) -> Result<(), TryReadError> {
        if self.is_poisoned() {
            return Err(TryReadError::Poisoned);
        }

        let mut state = self.state.lock().expect("rwlock state poisoned");
        if state.writer_active || state.writer_waiters > 0 {
            return Err(TryReadError::Locked);
        }

        state.readers += 1;
        drop(state);
        Ok(())
    }

    fn acquire_write_state(&self) -> Result<(), RwLockError> {
        if self.is_poisoned() {
            return Err(RwLockError::Poisoned);
        }

        let mut state = self.state.lock().expect("rwlock state poisoned");
        state.writer_waiters += 1;

        loop {
            if self.is_poisoned() {
                state.writer_waiters = state.writer_waiters.saturating_sub(1);
                return Err(RwLockError::Poisoned);
            }

            if !state.writer_active && state.readers == 0 {
                state.writer_active = true;
                state.writer_waiters = state.writer_waiters.saturating_sub(1);
                return Ok(());
            }

            tracing::trace!(
                readers = state.readers,
                writer_waiters = state.writer_waiters,
                writer_active = state.writer_active,
                "writer blocked"
            );
            state = self.writer_cv.wait(state).expect("rwlock state poisoned");
        }
    }

    fn try_acquire_write_state(&self) -> Result<(), TryWriteError> {
        if self.is_poisoned() {
            return Err(TryWriteError::Poisoned);
        }

        // try_lock rather than lock: a probe must never block, not even
        // on the state mutex.
        let Ok(mut state) = self.state.try_lock() else {
            return Err(TryWriteError::Locked);
        };
        if state.writer_active || state.readers > 0 {
            return Err(TryWriteError::Locked);
        }

        state.writer_active = true;
        drop(state);
        Ok(())
    }

    fn release_reader(&self) {
        let mut state = self.state.lock().expect("rwlock state poisoned");
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 && state.writer_waiters > 0 {
            self.writer_cv.notify_all();
        }
    }

    fn release_writer(&self) {
        let mut state = self.state.lock().expect("rwlock state poisoned");
        state.writer_active = false;
        if state.writer_waiters > 0 {
            self.writer_cv.notify_all();
        } else {
            self.reader_cv.notify_all();
        }
    }

    #[cfg(test)]
    pub(crate) fn debug_state(&self) -> State {
        self.state.lock().expect("rwlock state poisoned").clone()
    }
}

/// Guard for a read lock.
#[must_use = "guard will be immediately released if not held"]
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
    guard: std::sync::RwLockReadGuard<'a, T>,
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.lock.poisoned.store(true, Ordering::Release);
        }
        self.lock.release_reader();
    }
}

/// Guard for a write lock.
#[must_use = "guard will be immediately released if not held"]
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
    guard: std::sync::RwLockWriteGuard<'a, T>,
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.lock.poisoned.store(true, Ordering::Release);
        }
        self.lock.release_writer();
    }
}
