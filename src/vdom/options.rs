//! Engine extension points.
//!
//! The engine exposes its node visits through ordered observer lists
//! instead of a single overwritable function slot, so several consumers
//! can watch the same traversal without clobbering each other. Observers
//! run in registration order, once per visited node:
//!
//! - before-diff: before the node's props are reconciled; the observer may
//!   rewrite the node (this is where renderers link containers and swap
//!   tags for their proxy elements)
//! - diffed: after the node and its children have been processed
//! - unmount: as the node leaves the tree, before its element is removed
//!
//! The engine never initiates work on behalf of an observer; observers are
//! purely reactive to the traversal.

use std::cell::RefCell;
use std::rc::Rc;

use super::diff::FiberId;
use super::RenderError;

// =============================================================================
// Observer Types
// =============================================================================

/// Visit observer. A returned error aborts the commit.
pub type DiffObserver = Rc<dyn Fn(FiberId) -> Result<(), RenderError>>;

/// Unmount observer. Unmount teardown is not abortable from here.
pub type UnmountObserver = Rc<dyn Fn(FiberId)>;

thread_local! {
    static BEFORE_DIFF: RefCell<Vec<DiffObserver>> = RefCell::new(Vec::new());
    static DIFFED: RefCell<Vec<DiffObserver>> = RefCell::new(Vec::new());
    static UNMOUNT: RefCell<Vec<UnmountObserver>> = RefCell::new(Vec::new());
}

// =============================================================================
// Registration
// =============================================================================

/// Observe nodes before their props are reconciled.
pub fn on_before_diff(observer: DiffObserver) {
    BEFORE_DIFF.with(|list| list.borrow_mut().push(observer));
}

/// Observe nodes after they and their children have been processed.
pub fn on_diffed(observer: DiffObserver) {
    DIFFED.with(|list| list.borrow_mut().push(observer));
}

/// Observe nodes as they leave the tree.
pub fn on_unmount(observer: UnmountObserver) {
    UNMOUNT.with(|list| list.borrow_mut().push(observer));
}

/// Drop all observers. Test support.
pub fn reset_observers() {
    BEFORE_DIFF.with(|list| list.borrow_mut().clear());
    DIFFED.with(|list| list.borrow_mut().clear());
    UNMOUNT.with(|list| list.borrow_mut().clear());
}

// =============================================================================
// Dispatch
// =============================================================================

fn snapshot_diff(list: &'static std::thread::LocalKey<RefCell<Vec<DiffObserver>>>) -> Vec<DiffObserver> {
    list.with(|observers| observers.borrow().clone())
}

pub(crate) fn run_before_diff(id: FiberId) -> Result<(), RenderError> {
    for observer in snapshot_diff(&BEFORE_DIFF) {
        observer(id)?;
    }
    Ok(())
}

pub(crate) fn run_diffed(id: FiberId) -> Result<(), RenderError> {
    for observer in snapshot_diff(&DIFFED) {
        observer(id)?;
    }
    Ok(())
}

pub(crate) fn run_unmount(id: FiberId) {
    let observers = UNMOUNT.with(|list| list.borrow().clone());
    for observer in observers {
        observer(id);
    }
}
