//! Per-thread "current telemetry" association
//!
//! Lets code deep inside the pipeline (a text shaper called from layout, for
//! instance) find the record for the commit running on its thread without
//! being handed one.
//!
//! Each thread has one slot. The slot holds a [`Weak`] reference, so the
//! registry never keeps a record alive; a record dropped while still
//! associated reads back as `None`.
//!
//! Two ways to fill the slot:
//!
//! - [`associate`] / [`dissociate`]: a single slot with no stacking. A second
//!   `associate` replaces the first.
//! - [`enter`]: scoped association that restores whatever was there before
//!   when the guard drops. Nested commits on one thread should use this.
//!
//! # Example
//!
//! ```rust
//! use commit_telemetry::{registry, CommitTelemetry};
//!
//! fn shape_run() {
//!     // Far from the driver, no handle in sight.
//!     registry::record_text_measurement();
//! }
//!
//! let telemetry = CommitTelemetry::new().into_shared();
//! {
//!     let _current = registry::enter(&telemetry);
//!     telemetry.begin_layout();
//!     shape_run();
//!     telemetry.end_layout();
//! }
//!
//! assert!(registry::current().is_none());
//! assert_eq!(telemetry.text_measurement_count(), 1);
//! ```

use crate::record::CommitTelemetry;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

thread_local! {
    static CURRENT: RefCell<Option<Weak<CommitTelemetry>>> = const { RefCell::new(None) };
}

fn replace_slot(next: Option<Weak<CommitTelemetry>>) -> Option<Weak<CommitTelemetry>> {
    CURRENT.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), next))
}

/// Make `telemetry` the calling thread's current record.
///
/// Overwrites any previous association. If that replaces a different
/// record that is still alive, the earlier one can no longer be reached
/// through [`current`]; a warning is logged.
pub fn associate(telemetry: &Rc<CommitTelemetry>) {
    let prev = replace_slot(Some(Rc::downgrade(telemetry)));

    if let Some(prev) = prev.and_then(|weak| weak.upgrade()) {
        if !Rc::ptr_eq(&prev, telemetry) {
            tracing::warn!(
                target: "commit_telemetry",
                replaced_revision = prev.revision_number(),
                revision = telemetry.revision_number(),
                "current telemetry overwritten without dissociate"
            );
        }
    }

    tracing::debug!(
        target: "commit_telemetry",
        revision = telemetry.revision_number(),
        "telemetry associated with thread"
    );
}

/// Clear the calling thread's slot, whatever it holds.
pub fn dissociate() {
    if replace_slot(None).is_some() {
        tracing::debug!(target: "commit_telemetry", "telemetry dissociated from thread");
    }
}

/// The calling thread's current record, if one is associated and alive.
pub fn current() -> Option<Rc<CommitTelemetry>> {
    CURRENT.with(|slot| slot.borrow().as_ref().and_then(Weak::upgrade))
}

/// Whether the calling thread has a live current record.
pub fn is_associated() -> bool {
    current().is_some()
}

/// Run `f` against the current record, if there is one.
pub fn with_current<R>(f: impl FnOnce(&CommitTelemetry) -> R) -> Option<R> {
    current().map(|telemetry| f(&telemetry))
}

/// Count a text measurement on the current record.
///
/// Returns `false` when no record is associated with this thread.
pub fn record_text_measurement() -> bool {
    with_current(CommitTelemetry::record_text_measurement).is_some()
}

/// Make `telemetry` current until the returned guard drops, then restore
/// the previous association.
pub fn enter(telemetry: &Rc<CommitTelemetry>) -> CurrentTelemetryGuard {
    let prev = replace_slot(Some(Rc::downgrade(telemetry)));

    tracing::debug!(
        target: "commit_telemetry",
        revision = telemetry.revision_number(),
        nested = prev.is_some(),
        "telemetry entered"
    );

    CurrentTelemetryGuard { prev }
}

/// Restores the previous current record on drop.
///
/// Returned by [`enter`]. Guards must be dropped in reverse order of
/// creation, which ordinary scoping does.
#[must_use = "the association is undone as soon as the guard is dropped"]
pub struct CurrentTelemetryGuard {
    prev: Option<Weak<CommitTelemetry>>,
}

impl Drop for CurrentTelemetryGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        replace_slot(prev);
    }
}
