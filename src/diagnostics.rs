//! Best-effort lock-state introspection for status displays.
//!
//! Two probes, both non-blocking and both approximate:
//!
//! - [`probe_write`] asks a [`RwLock`](crate::sync::RwLock) whether a
//!   write guard could be taken right now. Success is released
//!   immediately and reported [`LockProbe::Free`]; failure is
//!   [`LockProbe::Held`]. Holder identity is not tracked.
//! - [`ResourceMonitor`] keeps an independent busy flag per monitored
//!   resource and reports "all simultaneously busy" as a heuristic
//!   signal. This is an approximation, not a wait-for-graph cycle
//!   detector: it can false-positive (everything busy, no cycle) and
//!   false-negative (a real cycle across resources it does not monitor).

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::sync::RwLock;

/// Result of a non-blocking write probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LockProbe {
    /// A write guard could be taken (it was released immediately).
    Free,
    /// The lock is held, a writer is pending, or the probe itself was
    /// contended. A poisoned lock also reports `Held`: it is not free.
    Held,
}

impl std::fmt::Display for LockProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Held => write!(f, "held"),
        }
    }
}

/// Probes whether `lock` could be write-acquired without blocking.
///
/// The state observed is already stale by the time the caller sees it;
/// this is a status-display hint, never a synchronization mechanism.
pub fn probe_write<T>(lock: &RwLock<T>) -> LockProbe {
    match lock.try_write() {
        Ok(guard) => {
            drop(guard);
            LockProbe::Free
        }
        Err(_) => LockProbe::Held,
    }
}

/// Per-resource busy status in a [`MonitorSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
    /// Resource name.
    pub name: String,
    /// Whether a cooperating caller is inside that resource's critical
    /// section.
    pub busy: bool,
}

/// Serializable status listing produced by [`ResourceMonitor::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorSnapshot {
    /// One entry per monitored resource.
    pub resources: Vec<ResourceStatus>,
    /// The "all simultaneously busy" heuristic at snapshot time.
    pub all_busy: bool,
}

#[derive(Debug)]
struct ResourceFlag {
    name: String,
    busy: AtomicBool,
}

/// Independent per-resource busy flags, set by cooperating callers around
/// their critical sections.
///
/// The flags are advisory only: nothing enforces that a caller sets them,
/// and reading them races with the sections they describe.
#[derive(Debug)]
pub struct ResourceMonitor {
    flags: Vec<ResourceFlag>,
}

impl ResourceMonitor {
    /// Creates a monitor over the given resource names.
    #[must_use]
    pub fn new<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            flags: names
                .into_iter()
                .map(|name| ResourceFlag {
                    name: name.to_string(),
                    busy: AtomicBool::new(false),
                })
                .collect(),
        }
    }

    /// Marks `name` busy for the lifetime of the returned guard.
    ///
    /// Unknown names yield a guard that does nothing.
    pub fn enter(&self, name: &str) -> BusyGuard<'_> {
        let flag = self.flags.iter().find(|flag| flag.name == name);
        if let Some(flag) = flag {
            flag.busy.store(true, Ordering::Release);
        } else {
            tracing::warn!(name, "entering unmonitored resource");
        }
        BusyGuard {
            flag: flag.map(|flag| &flag.busy),
        }
    }

    /// Reports whether `name` is currently flagged busy.
    #[must_use]
    pub fn is_busy(&self, name: &str) -> bool {
        self.flags
            .iter()
            .any(|flag| flag.name == name && flag.busy.load(Ordering::Acquire))
    }

    /// The heuristic signal: true iff every monitored resource is flagged
    /// busy at once (and at least one resource is monitored).
    #[must_use]
    pub fn all_busy(&self) -> bool {
        !self.flags.is_empty()
            && self
                .flags
                .iter()
                .all(|flag| flag.busy.load(Ordering::Acquire))
    }

    /// Captures the current flag states.
    #[must_use]
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            resources: self
                .flags
                .iter()
                .map(|flag| ResourceStatus {
                    name: flag.name.clone(),
                    busy: flag.busy.load(Ordering::Acquire),
                })
                .collect(),
            all_busy: self.all_busy(),
        }
    }
}

/// Clears the busy flag on drop.
#[must_use = "guard clears the busy flag when dropped"]
pub struct BusyGuard<'a> {
    flag: Option<&'a AtomicBool>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.flag {
            flag.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn probe_reports_free_then_held() {
        init_test("probe_reports_free_then_held");
        let lock = RwLock::new(0_u32);

        let probe = probe_write(&lock);
        crate::assert_with_log!(probe == LockProbe::Free, "free", LockProbe::Free, probe);

        // The probe itself must not leave the lock held.
        let again = probe_write(&lock);
        crate::assert_with_log!(again == LockProbe::Free, "still free", LockProbe::Free, again);

        let guard = lock.read().expect("read");
        let probe = probe_write(&lock);
        crate::assert_with_log!(probe == LockProbe::Held, "held", LockProbe::Held, probe);
        drop(guard);
        crate::test_complete!("probe_reports_free_then_held");
    }

    #[test]
    fn all_busy_requires_every_flag() {
        init_test("all_busy_requires_every_flag");
        let monitor = ResourceMonitor::new(["shelf", "editor"]);

        let shelf = monitor.enter("shelf");
        crate::assert_with_log!(!monitor.all_busy(), "one of two", false, monitor.all_busy());

        let editor = monitor.enter("editor");
        crate::assert_with_log!(monitor.all_busy(), "both busy", true, monitor.all_busy());

        drop(editor);
        crate::assert_with_log!(!monitor.all_busy(), "editor released", false, monitor.all_busy());
        drop(shelf);
        crate::assert_with_log!(!monitor.is_busy("shelf"), "shelf released", false, monitor.is_busy("shelf"));
        crate::test_complete!("all_busy_requires_every_flag");
    }

    #[test]
    fn snapshot_serializes() {
        init_test("snapshot_serializes");
        let monitor = ResourceMonitor::new(["shelf"]);
        let _busy = monitor.enter("shelf");

        let snapshot = monitor.snapshot();
        crate::assert_with_log!(snapshot.all_busy, "all busy", true, snapshot.all_busy);

        let json = serde_json::to_string(&snapshot).expect("serialize snapshot");
        let well_formed = json.contains("\"shelf\"") && json.contains("\"busy\":true");
        crate::assert_with_log!(well_formed, "snapshot json", true, well_formed);
        crate::test_complete!("snapshot_serializes");
    }

    #[test]
    fn unknown_resource_is_a_noop_guard() {
        init_test("unknown_resource_is_a_noop_guard");
        let monitor = ResourceMonitor::new(["shelf"]);

        let guard = monitor.enter("vault");
        crate::assert_with_log!(!monitor.all_busy(), "no flag set", false, monitor.all_busy());
        drop(guard);
        crate::test_complete!("unknown_resource_is_a_noop_guard");
    }
}
