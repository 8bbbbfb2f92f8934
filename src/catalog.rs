//! Shared keyed inventory with a blocking check-out protocol.
//!
//! The [`Catalog`] owns the inventory mapping behind the writer-preference
//! [`RwLock`](crate::sync::RwLock) and layers a second synchronization
//! object on top: its own [`Notify`](crate::sync::Notify), on which a
//! check-out that observes zero stock suspends until a return (or new
//! stock) wakes it.
//!
//! The release-wait-reacquire handoff across the two objects is
//! deliberate: the wait predicate needs read access to the shelf, which
//! the suspended caller cannot safely take while still holding the write
//! access its check-out started with. So the zero-stock path releases
//! write access, waits on the notify, re-checks the predicate under a
//! fresh read acquisition on every wake, and only then re-acquires write
//! access to complete the decrement.
//!
//! Wakes are broadcast: a return on one title wakes waiters on every
//! title, each of which re-checks its own predicate and goes back to
//! sleep if it still does not hold. No FIFO order exists among waiters;
//! a particular waiter can starve under contention.

use std::collections::HashMap;

use serde::Serialize;

use crate::diagnostics::{probe_write, LockProbe};
use crate::error::{Error, Result};
use crate::sync::{Notify, ReentrantLock, RwLock};

/// A single inventory item.
#[derive(Debug)]
struct Item {
    id: u64,
    title: String,
    author: String,
    quantity: u32,
    /// Requester identities currently holding a copy (multiset: the same
    /// patron may hold several copies).
    holders: Vec<String>,
}

/// Read-only listing entry produced by [`Catalog::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    /// Stable item id, assigned at insertion.
    pub id: u64,
    /// Title (the item's identity key).
    pub title: String,
    /// Author.
    pub author: String,
    /// Copies currently on the shelf.
    pub quantity: u32,
    /// Copies currently checked out.
    pub on_loan: usize,
}

/// A compound edit applied through [`Catalog::edit_item`]. `None` fields
/// are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ItemEdit {
    /// New title, if renaming.
    pub title: Option<String>,
    /// New author.
    pub author: Option<String>,
    /// New shelf quantity.
    pub quantity: Option<u32>,
}

#[derive(Debug, Default)]
struct Shelf {
    items: HashMap<String, Item>,
    next_id: u64,
}

/// Shared keyed inventory guarded by a writer-preference lock.
///
/// An explicitly owned context object: callers hold the `Catalog` (or an
/// `Arc` of it) and pass it where needed; there is no process-wide
/// singleton.
///
/// # Blocking
///
/// [`Catalog::check_out`] may block the calling thread for an unbounded
/// duration when the title is out of stock. There is no timeout; a
/// blocked check-out that never sees a matching return is a liveness
/// risk, not a crash.
#[derive(Debug, Default)]
pub struct Catalog {
    shelf: RwLock<Shelf>,
    /// The catalog's own condition variable, distinct from the shelf
    /// lock's internal one.
    returns: Notify,
    /// Serializes compound multi-step edits; reentrant so sub-operations
    /// may each take it while the compound update already holds it.
    edit_lock: ReentrantLock,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` copies of a title, inserting the item if it is new
    /// and restocking it otherwise. Returns the item id.
    ///
    /// Broadcasts to waiters: new stock can satisfy a suspended
    /// check-out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Poisoned`] if the shelf lock is poisoned.
    pub fn add_item(&self, title: &str, author: &str, quantity: u32) -> Result<u64> {
        let id = {
            let mut shelf = self.shelf.write()?;
            let shelf = &mut *shelf;
            if let Some(item) = shelf.items.get_mut(title) {
                // Saturate rather than wrap: a restock past u32::MAX must
                // not corrupt the count.
                item.quantity = item.quantity.saturating_add(quantity);
                item.id
            } else {
                shelf.next_id += 1;
                let id = shelf.next_id;
                shelf.items.insert(
                    title.to_string(),
                    Item {
                        id,
                        title: title.to_string(),
                        author: author.to_string(),
                        quantity,
                        holders: Vec::new(),
                    },
                );
                id
            }
        };
        tracing::debug!(title, author, quantity, id, "item added");
        self.returns.notify_all();
        Ok(id)
    }

    /// Removes a title from the catalog.
    ///
    /// Waiters blocked on the removed title are woken and surface
    /// [`Error::NotFound`] instead of sleeping forever.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the title is absent.
    pub fn remove_item(&self, title: &str) -> Result<()> {
        {
            let mut shelf = self.shelf.write()?;
            if shelf.items.remove(title).is_none() {
                return Err(Error::NotFound(title.to_string()));
            }
        }
        tracing::debug!(title, "item removed");
        self.returns.notify_all();
        Ok(())
    }

    /// Checks out one copy of `title` for `patron`, blocking while the
    /// title is out of stock.
    ///
    /// On zero stock the caller releases write access, suspends on the
    /// catalog's notify, re-evaluates availability under a fresh read
    /// acquisition on every wake, and retries the decrement under write
    /// access once stock appears. Returns the quantity remaining after
    /// the decrement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the title is absent (including a
    /// removal that happens while waiting).
    pub fn check_out(&self, title: &str, patron: &str) -> Result<u32> {
        loop {
            {
                let mut shelf = self.shelf.write()?;
                let Some(item) = shelf.items.get_mut(title) else {
                    return Err(Error::NotFound(title.to_string()));
                };
                if item.quantity > 0 {
                    item.quantity -= 1;
                    item.holders.push(patron.to_string());
                    let remaining = item.quantity;
                    tracing::debug!(title, patron, remaining, "checked out");
                    return Ok(remaining);
                }
            }

            tracing::debug!(title, patron, "out of stock, suspending until a return");
            self.returns.wait_until(|| {
                // Fresh read acquisition per evaluation. A poisoned or
                // vanished shelf entry also wakes us so the write path
                // above can report the failure.
                self.shelf
                    .read()
                    .map_or(true, |shelf| shelf.items.get(title).map_or(true, |item| item.quantity > 0))
            });
            // Another waiter may have snatched the copy between the wake
            // and our write re-acquisition; loop and wait again.
        }
    }

    /// Non-blocking check-out probe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockBusy`] if the shelf lock is held or its state
    /// mutex is contended, [`Error::NotFound`] for an unknown title, and
    /// [`Error::NotAvailable`] on zero stock (where the blocking call
    /// would suspend). No side effects on failure.
    pub fn try_check_out(&self, title: &str, patron: &str) -> Result<u32> {
        let mut shelf = self.shelf.try_write()?;
        let Some(item) = shelf.items.get_mut(title) else {
            return Err(Error::NotFound(title.to_string()));
        };
        if item.quantity == 0 {
            return Err(Error::NotAvailable(title.to_string()));
        }
        item.quantity -= 1;
        item.holders.push(patron.to_string());
        let remaining = item.quantity;
        tracing::debug!(title, patron, remaining, "checked out (try)");
        Ok(remaining)
    }

    /// Returns one copy of `title` previously checked out by `patron`,
    /// then broadcasts so every suspended check-out re-checks its own
    /// predicate.
    ///
    /// Returns the quantity on the shelf after the increment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotBorrowed`] (state unchanged) if `patron` is not
    /// recorded as a current holder, and [`Error::NotFound`] for an
    /// unknown title.
    pub fn check_in(&self, title: &str, patron: &str) -> Result<u32> {
        let available = {
            let mut shelf = self.shelf.write()?;
            let Some(item) = shelf.items.get_mut(title) else {
                return Err(Error::NotFound(title.to_string()));
            };
            let Some(position) = item.holders.iter().position(|holder| holder == patron) else {
                return Err(Error::NotBorrowed {
                    title: title.to_string(),
                    patron: patron.to_string(),
                });
            };
            item.holders.swap_remove(position);
            item.quantity += 1;
            item.quantity
        };
        tracing::debug!(title, patron, available, "checked in");
        // Write access is released before the broadcast: waiters need
        // read access to re-check their predicates.
        self.returns.notify_all();
        Ok(available)
    }

    /// Reports how many copies of `title` are on the shelf. Read access
    /// only; never blocks behind the catalog's notify and never mutates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the title is absent.
    pub fn availability(&self, title: &str) -> Result<u32> {
        let shelf = self.shelf.read()?;
        shelf
            .items
            .get(title)
            .map(|item| item.quantity)
            .ok_or_else(|| Error::NotFound(title.to_string()))
    }

    /// Applies a compound multi-step edit under the reentrant edit lock.
    ///
    /// Each sub-operation ([`Catalog::rename_item`],
    /// [`Catalog::set_author`], [`Catalog::set_quantity`]) takes the edit
    /// lock itself; reentrancy lets this compound form hold it across all
    /// of them. Guard drops keep the depth balanced on every exit path,
    /// including an early `NotFound` return from a sub-operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the title (or, mid-edit, the
    /// renamed title) is absent.
    pub fn edit_item(&self, title: &str, edit: ItemEdit) -> Result<()> {
        let _guard = self.edit_lock.lock();
        let mut current = title.to_string();
        if let Some(new_title) = edit.title {
            self.rename_item(&current, &new_title)?;
            current = new_title;
        }
        if let Some(author) = edit.author {
            self.set_author(&current, &author)?;
        }
        if let Some(quantity) = edit.quantity {
            self.set_quantity(&current, quantity)?;
        }
        Ok(())
    }

    /// Renames an item, re-keying it under the new title.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the title is absent.
    pub fn rename_item(&self, title: &str, new_title: &str) -> Result<()> {
        let _guard = self.edit_lock.lock();
        let mut shelf = self.shelf.write()?;
        let Some(mut item) = shelf.items.remove(title) else {
            return Err(Error::NotFound(title.to_string()));
        };
        item.title = new_title.to_string();
        shelf.items.insert(new_title.to_string(), item);
        tracing::debug!(from = title, to = new_title, "item renamed");
        Ok(())
    }

    /// Sets an item's author.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the title is absent.
    pub fn set_author(&self, title: &str, author: &str) -> Result<()> {
        let _guard = self.edit_lock.lock();
        let mut shelf = self.shelf.write()?;
        let Some(item) = shelf.items.get_mut(title) else {
            return Err(Error::NotFound(title.to_string()));
        };
        item.author = author.to_string();
        Ok(())
    }

    /// Sets an item's shelf quantity, broadcasting if stock became
    /// available.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the title is absent.
    pub fn set_quantity(&self, title: &str, quantity: u32) -> Result<()> {
        let _guard = self.edit_lock.lock();
        {
            let mut shelf = self.shelf.write()?;
            let Some(item) = shelf.items.get_mut(title) else {
                return Err(Error::NotFound(title.to_string()));
            };
            item.quantity = quantity;
        }
        if quantity > 0 {
            self.returns.notify_all();
        }
        Ok(())
    }

    /// Lists the inventory under read access, ordered by item id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Poisoned`] if the shelf lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<ItemSummary>> {
        let shelf = self.shelf.read()?;
        let mut listing: Vec<ItemSummary> = shelf
            .items
            .values()
            .map(|item| ItemSummary {
                id: item.id,
                title: item.title.clone(),
                author: item.author.clone(),
                quantity: item.quantity,
                on_loan: item.holders.len(),
            })
            .collect();
        listing.sort_by_key(|summary| summary.id);
        Ok(listing)
    }

    /// Non-blocking probe of the shelf lock: `Free` if a write guard
    /// could be taken (and immediately released), `Held` otherwise.
    #[must_use]
    pub fn lock_probe(&self) -> LockProbe {
        probe_write(&self.shelf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn stocked() -> Catalog {
        let catalog = Catalog::new();
        catalog
            .add_item("Dune", "Frank Herbert", 2)
            .expect("add Dune");
        catalog
            .add_item("Hyperion", "Dan Simmons", 1)
            .expect("add Hyperion");
        catalog
    }

    #[test]
    fn check_out_decrements_and_records_holder() {
        init_test("check_out_decrements_and_records_holder");
        let catalog = stocked();

        let remaining = catalog.check_out("Dune", "ada").expect("check out");
        crate::assert_with_log!(remaining == 1, "remaining", 1u32, remaining);

        let available = catalog.availability("Dune").expect("availability");
        crate::assert_with_log!(available == 1, "availability", 1u32, available);
        crate::test_complete!("check_out_decrements_and_records_holder");
    }

    #[test]
    fn check_out_unknown_title_fails_not_found() {
        init_test("check_out_unknown_title_fails_not_found");
        let catalog = stocked();

        let result = catalog.check_out("Missing", "ada");
        let not_found = matches!(result, Err(Error::NotFound(_)));
        crate::assert_with_log!(not_found, "not found", true, not_found);
        crate::test_complete!("check_out_unknown_title_fails_not_found");
    }

    #[test]
    fn check_in_without_borrow_fails_and_leaves_quantity() {
        init_test("check_in_without_borrow_fails_and_leaves_quantity");
        let catalog = stocked();

        let result = catalog.check_in("Dune", "ada");
        let not_borrowed = matches!(result, Err(Error::NotBorrowed { .. }));
        crate::assert_with_log!(not_borrowed, "not borrowed", true, not_borrowed);

        let available = catalog.availability("Dune").expect("availability");
        crate::assert_with_log!(available == 2, "quantity unchanged", 2u32, available);
        crate::test_complete!("check_in_without_borrow_fails_and_leaves_quantity");
    }

    #[test]
    fn check_in_restores_stock_for_valid_holder() {
        init_test("check_in_restores_stock_for_valid_holder");
        let catalog = stocked();

        catalog.check_out("Hyperion", "ada").expect("check out");
        let available = catalog.check_in("Hyperion", "ada").expect("check in");
        crate::assert_with_log!(available == 1, "restored", 1u32, available);
        crate::test_complete!("check_in_restores_stock_for_valid_holder");
    }

    #[test]
    fn zero_stock_check_out_suspends_until_return() {
        init_test("zero_stock_check_out_suspends_until_return");
        let catalog = Arc::new(Catalog::new());
        catalog.add_item("Dune", "Frank Herbert", 1).expect("add");
        catalog.check_out("Dune", "ada").expect("first check out");

        let waiter_catalog = Arc::clone(&catalog);
        let waiter = thread::spawn(move || waiter_catalog.check_out("Dune", "grace"));

        thread::sleep(Duration::from_millis(30));
        let blocked = !waiter.is_finished();
        crate::assert_with_log!(blocked, "waiter suspended", true, blocked);

        catalog.check_in("Dune", "ada").expect("check in");
        let remaining = waiter
            .join()
            .expect("waiter thread")
            .expect("waiter check out");
        crate::assert_with_log!(remaining == 0, "waiter decremented to 0", 0u32, remaining);

        let available = catalog.availability("Dune").expect("availability");
        crate::assert_with_log!(available == 0, "final availability", 0u32, available);
        crate::test_complete!("zero_stock_check_out_suspends_until_return");
    }

    #[test]
    fn new_stock_releases_waiter() {
        init_test("new_stock_releases_waiter");
        let catalog = Arc::new(Catalog::new());
        catalog.add_item("Dune", "Frank Herbert", 0).expect("add");

        let waiter_catalog = Arc::clone(&catalog);
        let waiter = thread::spawn(move || waiter_catalog.check_out("Dune", "grace"));

        thread::sleep(Duration::from_millis(30));
        let blocked = !waiter.is_finished();
        crate::assert_with_log!(blocked, "waiter suspended", true, blocked);

        catalog.add_item("Dune", "Frank Herbert", 1).expect("restock");
        let remaining = waiter
            .join()
            .expect("waiter thread")
            .expect("waiter check out");
        crate::assert_with_log!(remaining == 0, "restock consumed", 0u32, remaining);
        crate::test_complete!("new_stock_releases_waiter");
    }

    #[test]
    fn removal_wakes_waiter_into_not_found() {
        init_test("removal_wakes_waiter_into_not_found");
        let catalog = Arc::new(Catalog::new());
        catalog.add_item("Dune", "Frank Herbert", 0).expect("add");

        let waiter_catalog = Arc::clone(&catalog);
        let waiter = thread::spawn(move || waiter_catalog.check_out("Dune", "grace"));

        thread::sleep(Duration::from_millis(30));
        catalog.remove_item("Dune").expect("remove");

        let result = waiter.join().expect("waiter thread");
        let not_found = matches!(result, Err(Error::NotFound(_)));
        crate::assert_with_log!(not_found, "waiter surfaced NotFound", true, not_found);
        crate::test_complete!("removal_wakes_waiter_into_not_found");
    }

    #[test]
    fn try_check_out_reports_busy_under_writer() {
        init_test("try_check_out_reports_busy_under_writer");
        let catalog = stocked();

        let shelf_guard = catalog.shelf.write().expect("hold write");
        let result = catalog.try_check_out("Dune", "ada");
        let busy = matches!(result, Err(Error::LockBusy));
        crate::assert_with_log!(busy, "lock busy", true, busy);
        drop(shelf_guard);

        let remaining = catalog.try_check_out("Dune", "ada").expect("try after release");
        crate::assert_with_log!(remaining == 1, "try succeeded", 1u32, remaining);
        crate::test_complete!("try_check_out_reports_busy_under_writer");
    }

    #[test]
    fn try_check_out_zero_stock_is_not_available() {
        init_test("try_check_out_zero_stock_is_not_available");
        let catalog = Catalog::new();
        catalog.add_item("Dune", "Frank Herbert", 0).expect("add");

        let result = catalog.try_check_out("Dune", "ada");
        let unavailable = matches!(result, Err(Error::NotAvailable(_)));
        crate::assert_with_log!(unavailable, "not available", true, unavailable);
        crate::test_complete!("try_check_out_zero_stock_is_not_available");
    }

    #[test]
    fn restock_saturates_instead_of_wrapping() {
        init_test("restock_saturates_instead_of_wrapping");
        let catalog = Catalog::new();
        let id = catalog
            .add_item("Dune", "Frank Herbert", u32::MAX)
            .expect("add at capacity");

        let restock_id = catalog
            .add_item("Dune", "Frank Herbert", 10)
            .expect("restock past capacity");
        crate::assert_with_log!(restock_id == id, "same item", id, restock_id);

        let available = catalog.availability("Dune").expect("availability");
        crate::assert_with_log!(available == u32::MAX, "saturated", u32::MAX, available);
        crate::test_complete!("restock_saturates_instead_of_wrapping");
    }

    #[test]
    fn compound_edit_applies_all_steps() {
        init_test("compound_edit_applies_all_steps");
        let catalog = stocked();

        catalog
            .edit_item(
                "Dune",
                ItemEdit {
                    title: Some("Dune Messiah".to_string()),
                    author: None,
                    quantity: Some(5),
                },
            )
            .expect("edit");

        let available = catalog.availability("Dune Messiah").expect("availability");
        crate::assert_with_log!(available == 5, "renamed and restocked", 5u32, available);

        let old = catalog.availability("Dune");
        let gone = matches!(old, Err(Error::NotFound(_)));
        crate::assert_with_log!(gone, "old title gone", true, gone);
        crate::test_complete!("compound_edit_applies_all_steps");
    }

    #[test]
    fn failed_edit_releases_edit_lock() {
        init_test("failed_edit_releases_edit_lock");
        let catalog = stocked();

        let result = catalog.edit_item(
            "Missing",
            ItemEdit {
                title: Some("Still Missing".to_string()),
                ..ItemEdit::default()
            },
        );
        let not_found = matches!(result, Err(Error::NotFound(_)));
        crate::assert_with_log!(not_found, "edit failed", true, not_found);

        // A follow-up edit must not deadlock on a leaked guard.
        catalog
            .set_quantity("Dune", 7)
            .expect("edit lock released");
        crate::test_complete!("failed_edit_releases_edit_lock");
    }

    #[test]
    fn snapshot_lists_items_in_insertion_order() {
        init_test("snapshot_lists_items_in_insertion_order");
        let catalog = stocked();
        catalog.check_out("Dune", "ada").expect("check out");

        let listing = catalog.snapshot().expect("snapshot");
        crate::assert_with_log!(listing.len() == 2, "two items", 2usize, listing.len());
        crate::assert_with_log!(
            listing[0].title == "Dune",
            "first by id",
            "Dune",
            &listing[0].title
        );
        crate::assert_with_log!(listing[0].on_loan == 1, "loan recorded", 1usize, listing[0].on_loan);
        crate::test_complete!("snapshot_lists_items_in_insertion_order");
    }
}
