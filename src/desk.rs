//! Synchronous request surface consumed by the business layer.
//!
//! The [`Desk`] is the explicitly owned context object from which every
//! operation hangs: it owns the [`Catalog`] and a [`ResourceMonitor`], so
//! tests can stand up independent desks without hidden coupling through
//! process-wide state.
//!
//! Each circulation request is a `{operation, title, patron}` triple and
//! returns either a [`Receipt`] or a typed failure. [`OperationKind::CheckOut`]
//! may block the calling thread for an unbounded duration. Wire protocols,
//! persistence, and interactive surfaces are entirely the surrounding
//! application's responsibility.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ItemEdit, ItemSummary};
use crate::diagnostics::{LockProbe, MonitorSnapshot, ResourceMonitor};
use crate::error::Result;

/// Name of the monitored shelf resource (circulation critical sections).
const SHELF: &str = "shelf";
/// Name of the monitored editor resource (compound edits).
const EDITOR: &str = "editor";

/// The kind of circulation operation requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Blocking check-out; suspends on zero stock.
    CheckOut,
    /// Non-blocking check-out probe.
    TryCheckOut,
    /// Return a held copy.
    CheckIn,
    /// Read-only stock query.
    Availability,
}

/// A circulation request from the business layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Which operation to perform.
    pub op: OperationKind,
    /// Title the operation targets.
    pub title: String,
    /// Requester identity.
    pub patron: String,
}

/// Successful outcome of a circulation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The operation that was performed.
    pub op: OperationKind,
    /// Title the operation targeted.
    pub title: String,
    /// Requester identity.
    pub patron: String,
    /// Copies on the shelf after the operation.
    pub available: u32,
}

/// Front desk dispatching requests against the catalog.
#[derive(Debug)]
pub struct Desk {
    catalog: Catalog,
    monitor: ResourceMonitor,
}

impl Default for Desk {
    fn default() -> Self {
        Self::new()
    }
}

impl Desk {
    /// Creates a desk with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            monitor: ResourceMonitor::new([SHELF, EDITOR]),
        }
    }

    /// The underlying catalog, for direct inventory management.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Dispatches one circulation request.
    ///
    /// The shelf busy flag is held for the duration, including any
    /// blocking wait inside [`OperationKind::CheckOut`].
    ///
    /// # Errors
    ///
    /// Propagates the catalog's failure taxonomy unchanged: `NotFound`,
    /// `NotBorrowed`, `LockBusy` / `NotAvailable` (try probes only),
    /// `Poisoned`.
    pub fn handle(&self, request: &Request) -> Result<Receipt> {
        let _busy = self.monitor.enter(SHELF);
        tracing::debug!(op = ?request.op, title = %request.title, patron = %request.patron, "handling request");

        let available = match request.op {
            OperationKind::CheckOut => self.catalog.check_out(&request.title, &request.patron)?,
            OperationKind::TryCheckOut => {
                self.catalog.try_check_out(&request.title, &request.patron)?
            }
            OperationKind::CheckIn => self.catalog.check_in(&request.title, &request.patron)?,
            OperationKind::Availability => self.catalog.availability(&request.title)?,
        };

        Ok(Receipt {
            op: request.op,
            title: request.title.clone(),
            patron: request.patron.clone(),
            available,
        })
    }

    /// Adds stock, flagged as an editor critical section.
    ///
    /// # Errors
    ///
    /// See [`Catalog::add_item`].
    pub fn add_item(&self, title: &str, author: &str, quantity: u32) -> Result<u64> {
        let _busy = self.monitor.enter(EDITOR);
        self.catalog.add_item(title, author, quantity)
    }

    /// Removes a title, flagged as an editor critical section.
    ///
    /// # Errors
    ///
    /// See [`Catalog::remove_item`].
    pub fn remove_item(&self, title: &str) -> Result<()> {
        let _busy = self.monitor.enter(EDITOR);
        self.catalog.remove_item(title)
    }

    /// Applies a compound edit, flagged as an editor critical section.
    ///
    /// # Errors
    ///
    /// See [`Catalog::edit_item`].
    pub fn edit_item(&self, title: &str, edit: ItemEdit) -> Result<()> {
        let _busy = self.monitor.enter(EDITOR);
        self.catalog.edit_item(title, edit)
    }

    /// Lists the inventory.
    ///
    /// # Errors
    ///
    /// See [`Catalog::snapshot`].
    pub fn listing(&self) -> Result<Vec<ItemSummary>> {
        self.catalog.snapshot()
    }

    /// Non-blocking probe of the catalog lock for status displays.
    #[must_use]
    pub fn lock_status(&self) -> LockProbe {
        self.catalog.lock_probe()
    }

    /// The "all monitored resources busy" heuristic. An approximation
    /// only; see [`ResourceMonitor`].
    #[must_use]
    pub fn deadlock_hint(&self) -> bool {
        self.monitor.all_busy()
    }

    /// Current monitor flag states.
    #[must_use]
    pub fn monitor_snapshot(&self) -> MonitorSnapshot {
        self.monitor.snapshot()
    }
}
