//! Blocking event notification with predicate re-checking.
//!
//! [`Notify`] pairs a mutex with a condition variable and exposes a single
//! "wait until predicate" entry point. The predicate is re-evaluated on
//! every wake, which rules out the lost-wakeup and spurious-wake bugs of a
//! naive signal/wait pairing.
//!
//! The wake strategy is a broadcast: every waiter re-checks its own
//! predicate and goes back to sleep if it still does not hold. Under heavy
//! contention this wastes cycles on redundant re-checks (a thundering
//! herd); per-key wait queues would avoid that at the cost of bookkeeping.

use std::sync::{Condvar, Mutex};

/// A blocking notification primitive.
///
/// Waiters suspend in [`Notify::wait_until`] and are woken by
/// [`Notify::notify_all`]. The internal mutex only guards the wait itself;
/// the predicate is free to take whatever locks it needs, so the state it
/// inspects can live behind a different synchronization object than the
/// one being waited on.
///
/// # Example
///
/// ```ignore
/// let notify = Notify::new();
///
/// // Waiter: suspends until stock appears.
/// notify.wait_until(|| stock_of("Book A") > 0);
///
/// // Producer: after restocking.
/// notify.notify_all();
/// ```
#[derive(Debug, Default)]
pub struct Notify {
    mutex: Mutex<()>,
    cv: Condvar,
}

impl Notify {
    /// Creates a new `Notify` with no pending notifications.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    /// Blocks the calling thread until `predicate` returns true.
    ///
    /// The predicate is evaluated under the notify mutex: once before
    /// sleeping and again after every wake. Producers that change the
    /// observed state and then call [`Notify::notify_all`] are therefore
    /// never missed, even if the change lands between the check and the
    /// wait.
    ///
    /// The predicate must not call back into this `Notify`.
    pub fn wait_until<F>(&self, mut predicate: F)
    where
        F: FnMut() -> bool,
    {
        let mut held = self.mutex.lock().expect("notify mutex poisoned");
        while !predicate() {
            tracing::trace!("waiter suspending");
            held = self.cv.wait(held).expect("notify mutex poisoned");
            tracing::trace!("waiter woken, re-checking predicate");
        }
        drop(held);
    }

    /// Wakes every waiter so each re-checks its own predicate.
    ///
    /// The notify mutex is taken briefly before broadcasting; a waiter is
    /// then always either before its predicate check (and will observe the
    /// producer's change) or already suspended (and will be woken).
    pub fn notify_all(&self) {
        let held = self.mutex.lock().expect("notify mutex poisoned");
        drop(held);
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn wait_returns_immediately_when_predicate_holds() {
        init_test("wait_returns_immediately_when_predicate_holds");
        let notify = Notify::new();
        notify.wait_until(|| true);
        crate::test_complete!("wait_returns_immediately_when_predicate_holds");
    }

    #[test]
    fn notify_wakes_waiter_after_state_change() {
        init_test("notify_wakes_waiter_after_state_change");
        let notify = Arc::new(Notify::new());
        let ready = Arc::new(AtomicBool::new(false));

        let waiter_notify = Arc::clone(&notify);
        let waiter_ready = Arc::clone(&ready);
        let handle = thread::spawn(move || {
            waiter_notify.wait_until(|| waiter_ready.load(Ordering::Acquire));
        });

        thread::sleep(Duration::from_millis(20));
        ready.store(true, Ordering::Release);
        notify.notify_all();

        handle.join().expect("waiter thread");
        crate::test_complete!("notify_wakes_waiter_after_state_change");
    }

    #[test]
    fn broadcast_wakes_all_waiters() {
        init_test("broadcast_wakes_all_waiters");
        let notify = Arc::new(Notify::new());
        let ready = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let notify = Arc::clone(&notify);
            let ready = Arc::clone(&ready);
            let completed = Arc::clone(&completed);
            handles.push(thread::spawn(move || {
                notify.wait_until(|| ready.load(Ordering::Acquire));
                completed.fetch_add(1, Ordering::SeqCst);
            }));
        }

        thread::sleep(Duration::from_millis(20));
        ready.store(true, Ordering::Release);
        notify.notify_all();

        for handle in handles {
            handle.join().expect("waiter thread");
        }
        let count = completed.load(Ordering::SeqCst);
        crate::assert_with_log!(count == 3, "completed count", 3usize, count);
        crate::test_complete!("broadcast_wakes_all_waiters");
    }

    #[test]
    fn unrelated_waiter_goes_back_to_sleep() {
        init_test("unrelated_waiter_goes_back_to_sleep");
        let notify = Arc::new(Notify::new());
        let ready = Arc::new(AtomicBool::new(false));
        let rechecks = Arc::new(AtomicUsize::new(0));

        let waiter_notify = Arc::clone(&notify);
        let waiter_ready = Arc::clone(&ready);
        let waiter_rechecks = Arc::clone(&rechecks);
        let handle = thread::spawn(move || {
            waiter_notify.wait_until(|| {
                waiter_rechecks.fetch_add(1, Ordering::SeqCst);
                waiter_ready.load(Ordering::Acquire)
            });
        });

        // Wake without satisfying the predicate; the waiter must re-check
        // and suspend again rather than complete.
        thread::sleep(Duration::from_millis(20));
        notify.notify_all();
        thread::sleep(Duration::from_millis(20));
        let still_waiting = !handle.is_finished();
        crate::assert_with_log!(still_waiting, "waiter still blocked", true, still_waiting);

        ready.store(true, Ordering::Release);
        notify.notify_all();
        handle.join().expect("waiter thread");

        let checks = rechecks.load(Ordering::SeqCst);
        crate::assert_with_log!(checks >= 2, "predicate re-checked", true, checks >= 2);
        crate::test_complete!("unrelated_waiter_goes_back_to_sleep");
    }
}
