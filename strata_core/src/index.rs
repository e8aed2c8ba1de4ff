// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The scene-index trait and shared per-node state.

use core::fmt;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use strata_path::{ScenePath, Token};

use crate::notices::{AddedEntry, DirtiedEntry, RemovedEntry, RenamedEntry};
use crate::observer::{SceneIndexObserver, SceneIndexObserverRef};
use crate::prim::Prim;

/// A shared handle to a scene index.
pub type SceneIndexRef = Arc<dyn SceneIndex>;

/// A node in the scene-index composition graph.
///
/// The pull plane: [`prim`](Self::prim) and
/// [`child_prim_paths`](Self::child_prim_paths) are pure queries with no side
/// effects, total over all paths (unknown paths yield the placeholder prim
/// and no children). The push plane: notices are fanned out to observers
/// registered on the node's [`SceneIndexState`].
///
/// Implementations embed a [`SceneIndexState`] and expose it via
/// [`state`](Self::state); everything else (observer management, notice
/// dispatch, display name, tags) is provided on the state.
pub trait SceneIndex: Send + Sync + 'static {
    /// The prim at `path`.
    ///
    /// Never fails: a path this index knows nothing about yields
    /// [`Prim::placeholder`].
    fn prim(&self, path: &ScenePath) -> Prim;

    /// The *direct* children of `path`.
    ///
    /// Ordering is unspecified unless a concrete implementation documents
    /// otherwise ([`RetainedSceneIndex`](crate::RetainedSceneIndex) is
    /// depth-first deterministic).
    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath>;

    /// The node's shared state (observer registry, display name, tags).
    fn state(&self) -> &SceneIndexState;
}

impl dyn SceneIndex {
    /// Registers an observer. See [`SceneIndexState::add_observer`].
    pub fn add_observer(&self, observer: &SceneIndexObserverRef) {
        self.state().add_observer(observer);
    }

    /// Unregisters an observer. See [`SceneIndexState::remove_observer`].
    pub fn remove_observer(&self, observer: &SceneIndexObserverRef) {
        self.state().remove_observer(observer);
    }

    /// The node's debug label.
    pub fn display_name(&self) -> String {
        self.state().display_name()
    }
}

impl fmt::Debug for dyn SceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SceneIndex({})", self.display_name())
    }
}

/// One registered observer slot.
///
/// Removal during dispatch tombstones the slot instead of splicing the list;
/// tombstoned and dead slots are swept once the outermost dispatch completes.
struct ObserverSlot {
    observer: Weak<dyn SceneIndexObserver>,
    removed: AtomicBool,
}

impl ObserverSlot {
    fn is_same(&self, observer: &SceneIndexObserverRef) -> bool {
        self.observer
            .upgrade()
            .is_some_and(|live| ptr_eq(&live, observer))
    }
}

// Compares the data pointers only, sidestepping vtable-identity pitfalls of
// `Arc::ptr_eq` on trait objects.
fn ptr_eq(a: &SceneIndexObserverRef, b: &SceneIndexObserverRef) -> bool {
    core::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Shared per-node scene-index state.
///
/// Holds the observer registry (with the reentrancy guard that makes it safe
/// for an observer callback to re-enter the emitting node), the optional
/// display name, and the tag set. Concrete indices embed one and return it
/// from [`SceneIndex::state`].
pub struct SceneIndexState {
    type_label: &'static str,
    display_name: RwLock<Option<String>>,
    tags: RwLock<BTreeSet<Token>>,
    observers: RwLock<Vec<Arc<ObserverSlot>>>,
    // Depth of in-flight notice dispatches on this node. Nonzero means the
    // observer list may only be tombstoned, not spliced.
    notify_depth: AtomicUsize,
}

impl SceneIndexState {
    /// Creates state for a node whose default display name is `type_label`.
    #[must_use]
    pub fn new(type_label: &'static str) -> Self {
        Self {
            type_label,
            display_name: RwLock::new(None),
            tags: RwLock::new(BTreeSet::new()),
            observers: RwLock::new(Vec::new()),
            notify_depth: AtomicUsize::new(0),
        }
    }

    /// Registers an observer, held weakly.
    ///
    /// Registering the same observer twice is a usage error: it is reported
    /// and the duplicate registration is ignored.
    pub fn add_observer(&self, observer: &SceneIndexObserverRef) {
        let mut observers = self.observers.write();
        if self.notify_depth.load(Ordering::Acquire) == 0 {
            observers.retain(|slot| {
                slot.observer.strong_count() > 0 && !slot.removed.load(Ordering::Acquire)
            });
        }
        if observers.iter().any(|slot| slot.is_same(observer)) {
            log::error!(
                "observer registered twice on scene index {:?}; ignoring duplicate",
                self.type_label
            );
            return;
        }
        observers.push(Arc::new(ObserverSlot {
            observer: Arc::downgrade(observer),
            removed: AtomicBool::new(false),
        }));
    }

    /// Unregisters an observer.
    ///
    /// Safe to call from within a notification callback: during dispatch the
    /// slot is tombstoned (no further notices are delivered to it) and the
    /// list itself is compacted once the outermost dispatch returns.
    pub fn remove_observer(&self, observer: &SceneIndexObserverRef) {
        let mut observers = self.observers.write();
        if self.notify_depth.load(Ordering::Acquire) == 0 {
            observers.retain(|slot| !slot.is_same(observer));
        } else {
            for slot in observers.iter() {
                if slot.is_same(observer) {
                    slot.removed.store(true, Ordering::Release);
                }
            }
        }
    }

    /// Whether any live observer is registered.
    ///
    /// Filters typically check this before doing nontrivial notice
    /// translation work.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.observers
            .read()
            .iter()
            .any(|slot| slot.observer.strong_count() > 0 && !slot.removed.load(Ordering::Acquire))
    }

    /// Notifies observers that prims were added.
    pub fn send_prims_added(&self, sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        if entries.is_empty() {
            return;
        }
        self.dispatch(|observer| observer.prims_added(sender, entries));
    }

    /// Notifies observers that prims were removed.
    pub fn send_prims_removed(&self, sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        if entries.is_empty() {
            return;
        }
        self.dispatch(|observer| observer.prims_removed(sender, entries));
    }

    /// Notifies observers that prims were dirtied.
    pub fn send_prims_dirtied(&self, sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        if entries.is_empty() {
            return;
        }
        self.dispatch(|observer| observer.prims_dirtied(sender, entries));
    }

    /// Notifies observers that prims were renamed.
    pub fn send_prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        if entries.is_empty() {
            return;
        }
        self.dispatch(|observer| observer.prims_renamed(sender, entries));
    }

    // Delivers one batch to every observer registered at entry, in
    // registration order. The slot list is snapshotted so observers added
    // during dispatch see only subsequent batches; tombstones are honored
    // before each delivery so removal takes effect immediately.
    fn dispatch(&self, deliver: impl Fn(&dyn SceneIndexObserver)) {
        let snapshot: Vec<Arc<ObserverSlot>> = self.observers.read().iter().cloned().collect();
        self.notify_depth.fetch_add(1, Ordering::AcqRel);
        for slot in &snapshot {
            if slot.removed.load(Ordering::Acquire) {
                continue;
            }
            if let Some(observer) = slot.observer.upgrade() {
                deliver(&*observer);
            }
        }
        if self.notify_depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.observers.write().retain(|slot| {
                slot.observer.strong_count() > 0 && !slot.removed.load(Ordering::Acquire)
            });
        }
    }

    /// The node's debug label: the explicit name if set, else the type label.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.display_name
            .read()
            .clone()
            .unwrap_or_else(|| self.type_label.to_owned())
    }

    /// Sets the node's debug label.
    pub fn set_display_name(&self, name: impl Into<String>) {
        *self.display_name.write() = Some(name.into());
    }

    /// Adds a classification tag. Tags have no effect on queries.
    pub fn add_tag(&self, tag: impl Into<Token>) {
        self.tags.write().insert(tag.into());
    }

    /// Removes a classification tag.
    pub fn remove_tag(&self, tag: &Token) {
        self.tags.write().remove(tag);
    }

    /// Whether the node carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &Token) -> bool {
        self.tags.read().contains(tag)
    }

    /// All tags on the node.
    #[must_use]
    pub fn tags(&self) -> Vec<Token> {
        self.tags.read().iter().cloned().collect()
    }
}

impl fmt::Debug for SceneIndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneIndexState")
            .field("display_name", &self.display_name())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notices::RenamedEntry;
    use parking_lot::Mutex;

    struct TestIndex {
        state: SceneIndexState,
    }

    impl TestIndex {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                state: SceneIndexState::new("TestIndex"),
            })
        }

        fn emit(&self, paths: &[&str]) {
            let entries: Vec<AddedEntry> = paths
                .iter()
                .map(|p| AddedEntry::new(p.parse().unwrap(), "mesh"))
                .collect();
            self.state.send_prims_added(self, &entries);
        }
    }

    impl SceneIndex for TestIndex {
        fn prim(&self, _path: &ScenePath) -> Prim {
            Prim::placeholder()
        }
        fn child_prim_paths(&self, _path: &ScenePath) -> Vec<ScenePath> {
            Vec::new()
        }
        fn state(&self) -> &SceneIndexState {
            &self.state
        }
    }

    /// Records batches; optionally removes itself from the sender on the
    /// first batch it sees.
    struct SelfRemover {
        batches: Mutex<Vec<usize>>,
        remove_on_first: bool,
        this: Mutex<Option<SceneIndexObserverRef>>,
    }

    impl SelfRemover {
        fn new(remove_on_first: bool) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(Vec::new()),
                remove_on_first,
                this: Mutex::new(None),
            })
        }
    }

    impl SceneIndexObserver for SelfRemover {
        fn prims_added(&self, sender: &dyn SceneIndex, entries: &[AddedEntry]) {
            self.batches.lock().push(entries.len());
            if self.remove_on_first {
                if let Some(this) = self.this.lock().clone() {
                    sender.state().remove_observer(&this);
                }
            }
        }
        fn prims_removed(&self, _sender: &dyn SceneIndex, _entries: &[RemovedEntry]) {}
        fn prims_dirtied(&self, _sender: &dyn SceneIndex, _entries: &[DirtiedEntry]) {}
        fn prims_renamed(&self, _sender: &dyn SceneIndex, _entries: &[RenamedEntry]) {}
    }

    fn register(index: &Arc<TestIndex>, observer: &Arc<SelfRemover>) -> SceneIndexObserverRef {
        let as_ref: SceneIndexObserverRef = observer.clone();
        *observer.this.lock() = Some(as_ref.clone());
        index.state().add_observer(&as_ref);
        as_ref
    }

    #[test]
    fn removal_during_own_callback_stops_future_batches() {
        let index = TestIndex::new();
        let remover = SelfRemover::new(true);
        let bystander = SelfRemover::new(false);
        let _keep_a = register(&index, &remover);
        let _keep_b = register(&index, &bystander);

        index.emit(&["/a", "/b"]);
        index.emit(&["/c"]);

        // The remover saw all of batch 1 (both entries in one slice), and
        // nothing afterward; the bystander saw both batches.
        assert_eq!(*remover.batches.lock(), vec![2]);
        assert_eq!(*bystander.batches.lock(), vec![2, 1]);
    }

    #[test]
    fn dead_observers_are_swept_not_notified() {
        let index = TestIndex::new();
        let observer = SelfRemover::new(false);
        let keep = register(&index, &observer);

        index.emit(&["/a"]);
        *observer.this.lock() = None;
        drop(keep);
        drop(observer);
        index.emit(&["/b"]);
        assert!(!index.state().is_observed());
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let index = TestIndex::new();
        let observer = SelfRemover::new(false);
        let as_ref = register(&index, &observer);
        index.state().add_observer(&as_ref);

        index.emit(&["/a"]);
        // One batch, not two.
        assert_eq!(*observer.batches.lock(), vec![1]);
    }

    #[test]
    fn empty_batches_short_circuit() {
        let index = TestIndex::new();
        let observer = SelfRemover::new(false);
        let _keep = register(&index, &observer);
        index.emit(&[]);
        assert!(observer.batches.lock().is_empty());
    }
}
