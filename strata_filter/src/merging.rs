// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The multi-input merging scene index.

use core::fmt;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use strata_core::{
    convert_renamed_to_removed_and_added, AddedEntry, DirtiedEntry, Prim, PrimView, RemovedEntry,
    RenamedEntry, SceneIndex, SceneIndexObserver, SceneIndexObserverRef, SceneIndexRef,
    SceneIndexState,
};
use strata_data::{DataSourceRef, OverlayContainer};
use strata_path::ScenePath;

struct InputEntry {
    scene: SceneIndexRef,
    active_root: ScenePath,
}

impl InputEntry {
    fn is_sender(&self, sender: &dyn SceneIndex) -> bool {
        core::ptr::eq(
            Arc::as_ptr(&self.scene) as *const (),
            sender as *const dyn SceneIndex as *const (),
        )
    }
}

/// Combines an ordered list of `(input, active_root)` pairs with positional
/// strength: earlier-added inputs are stronger.
///
/// Each input contributes the subtree of its namespace under its
/// `active_root` (paths are absolute and shared; an active root restricts
/// participation, it does not remap). Per prim, the composed type is the
/// first non-empty type in strength order, and the composed data source
/// overlays every contributing input's source in strength order, recursively
/// at all nesting depths (see [`OverlayContainer`]).
///
/// Removal semantics are asymmetric by design: a removed notice is
/// subtree-transitive, while add/dirty notices are not. When an upstream
/// removal still leaves content at a path (contributed by another input), the
/// merge reports an *add* (resync) for the path and each surviving
/// descendant instead of a removal.
pub struct MergingSceneIndex {
    state: SceneIndexState,
    inputs: RwLock<Vec<InputEntry>>,
    weak_self: Weak<Self>,
}

impl MergingSceneIndex {
    /// Creates a merging scene index with no inputs.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            state: SceneIndexState::new("MergingSceneIndex"),
            inputs: RwLock::new(Vec::new()),
            weak_self: weak_self.clone(),
        })
    }

    fn as_observer(&self) -> Option<SceneIndexObserverRef> {
        self.weak_self
            .upgrade()
            .map(|this| this as SceneIndexObserverRef)
    }

    fn self_ref(&self) -> Option<SceneIndexRef> {
        self.weak_self
            .upgrade()
            .map(|this| this as SceneIndexRef)
    }

    // "Has the merge any opinion at this path" — used for ancestor synthesis.
    fn has_prim(&self, path: &ScenePath) -> bool {
        !self.prim(path).is_placeholder() || !self.child_prim_paths(path).is_empty()
    }

    /// Appends an input as the weakest member of the merge.
    ///
    /// `active_root` bounds the input's participation: only prims at or below
    /// it contribute. If the merge is observed, downstream observers are
    /// first shown placeholder adds for any ancestors of `active_root` the
    /// merge did not previously provide (a connected tree, never an orphan
    /// deep path), then one add batch covering the input's whole subtree,
    /// with each entry's type resolved against the merge itself so stronger
    /// pre-existing opinions win in the notices too.
    pub fn add_input_scene(&self, scene: SceneIndexRef, active_root: ScenePath) {
        let observed = self.state.is_observed();
        let mut notices: Vec<AddedEntry> = Vec::new();
        if observed {
            for ancestor in active_root.proper_prefixes() {
                if !self.has_prim(&ancestor) {
                    notices.push(AddedEntry::new(ancestor, ""));
                }
            }
        }

        self.inputs.write().push(InputEntry {
            scene: scene.clone(),
            active_root: active_root.clone(),
        });
        if let Some(observer) = self.as_observer() {
            scene.state().add_observer(&observer);
        }

        if observed {
            // Bulk-enumerate the new input's subtree in parallel; the merge
            // is re-queried for each type because a stronger input may
            // already be contributing at the same path. Read-only reentry
            // from worker threads is part of the scene-index contract here.
            let discovered = Mutex::new(Vec::new());
            rayon::scope(|scope| {
                self.spawn_subtree_walk(scope, &scene, active_root.clone(), &discovered);
            });
            notices.append(&mut discovered.into_inner());
            self.state.send_prims_added(self, &notices);
        }
    }

    fn spawn_subtree_walk<'a>(
        &'a self,
        scope: &rayon::Scope<'a>,
        scene: &'a SceneIndexRef,
        path: ScenePath,
        discovered: &'a Mutex<Vec<AddedEntry>>,
    ) {
        let prim_type = self.prim(&path).prim_type;
        discovered
            .lock()
            .push(AddedEntry::new(path.clone(), prim_type));
        for child in scene.child_prim_paths(&path) {
            scope.spawn(move |scope| {
                self.spawn_subtree_walk(scope, scene, child, discovered);
            });
        }
    }

    /// Removes an input from the merge.
    ///
    /// If observed, every path under the input's active root is re-examined
    /// against the remaining inputs: paths with nothing left are reported
    /// removed (subtree-transitively, so their children are not visited);
    /// paths that still have content are reported as adds (resyncs) and
    /// their children *are* visited, because an add does not imply descendant
    /// re-evaluation the way a subtree removal does.
    pub fn remove_input_scene(&self, scene: &SceneIndexRef) {
        let active_root = {
            let mut inputs = self.inputs.write();
            let position = inputs.iter().position(|entry| {
                core::ptr::eq(
                    Arc::as_ptr(&entry.scene) as *const (),
                    Arc::as_ptr(scene) as *const (),
                )
            });
            let Some(position) = position else {
                return;
            };
            inputs.remove(position).active_root
        };
        if let Some(observer) = self.as_observer() {
            scene.state().remove_observer(&observer);
        }

        if !self.state.is_observed() {
            return;
        }
        let mut removed = Vec::new();
        let mut added = Vec::new();
        let mut worklist = vec![active_root];
        while let Some(path) = worklist.pop() {
            let prim = self.prim(&path);
            let children = self.child_prim_paths(&path);
            if prim.data_source.is_none() && children.is_empty() {
                removed.push(RemovedEntry::new(path));
            } else {
                added.push(AddedEntry::new(path.clone(), prim.prim_type));
                // Visit the union of the surviving children and the removed
                // input's former children: a resync does not imply descendant
                // re-evaluation, and paths the departed input solely provided
                // still need their own removal notices.
                let mut next: BTreeSet<ScenePath> = children.into_iter().collect();
                next.extend(scene.child_prim_paths(&path));
                worklist.extend(next);
            }
        }
        self.state.send_prims_removed(self, &removed);
        self.state.send_prims_added(self, &added);
    }

    /// The current number of inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inputs.read().len()
    }
}

impl SceneIndex for MergingSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        let inputs = self.inputs.read();
        if inputs.len() == 1 {
            return inputs[0].scene.prim(path);
        }

        let mut prim_type = strata_path::Token::empty();
        let mut sources: Vec<DataSourceRef> = Vec::new();
        for entry in inputs.iter() {
            if !path.has_prefix(&entry.active_root) {
                continue;
            }
            let contribution = entry.scene.prim(path);
            if prim_type.is_empty() && !contribution.prim_type.is_empty() {
                prim_type = contribution.prim_type;
            }
            if let Some(source) = contribution.data_source {
                sources.push(source);
            }
        }
        let data_source = match sources.len() {
            0 => None,
            1 => sources.pop(),
            _ => Some(OverlayContainer::new(sources)),
        };
        Prim {
            prim_type,
            data_source,
        }
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        let inputs = self.inputs.read();
        let mut children: BTreeSet<ScenePath> = BTreeSet::new();
        for entry in inputs.iter() {
            if path.has_prefix(&entry.active_root) {
                children.extend(entry.scene.child_prim_paths(path));
            } else if let Some(hop) = path.child_toward(&entry.active_root) {
                // The active root is somewhere below us: synthesize exactly
                // the one intermediate child needed to keep walking toward
                // it, without the input enumerating anything.
                children.insert(hop);
            }
        }
        children.into_iter().collect()
    }

    fn state(&self) -> &SceneIndexState {
        &self.state
    }
}

impl SceneIndexObserver for MergingSceneIndex {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        if !self.state.is_observed() {
            return;
        }
        if self.inputs.read().len() < 2 {
            self.state.send_prims_added(self, entries);
            return;
        }
        // Re-resolve each entry's type against the composition so stronger
        // inputs mask weaker declarations, but never drop an entry: a weaker
        // input gaining a data source still matters for invalidation, and
        // `prim` remains the authority for actual values.
        let resolved: Vec<AddedEntry> = entries
            .iter()
            .map(|entry| AddedEntry::new(entry.path.clone(), self.prim(&entry.path).prim_type))
            .collect();
        self.state.send_prims_added(self, &resolved);
    }

    fn prims_removed(&self, sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        if !self.state.is_observed() {
            return;
        }
        let mut removed = Vec::new();
        let mut added = Vec::new();
        for entry in entries {
            let survives = {
                let inputs = self.inputs.read();
                inputs.iter().any(|input| {
                    if input.is_sender(sender) {
                        return false;
                    }
                    if !entry.path.has_prefix(&input.active_root)
                        && input.active_root.has_prefix(&entry.path)
                    {
                        // Active root below the removed path: the bridge
                        // children it synthesizes still exist.
                        return true;
                    }
                    if !entry.path.has_prefix(&input.active_root) {
                        return false;
                    }
                    let prim = input.scene.prim(&entry.path);
                    prim.data_source.is_some()
                        || !input.scene.child_prim_paths(&entry.path).is_empty()
                })
            };
            if !survives {
                removed.push(entry.clone());
            } else if let Some(this) = self.self_ref() {
                // Not a removal: resync the whole surviving subtree.
                for path in PrimView::new(this.clone(), entry.path.clone()) {
                    added.push(AddedEntry::new(path.clone(), self.prim(&path).prim_type));
                }
            }
        }
        self.state.send_prims_removed(self, &removed);
        self.state.send_prims_added(self, &added);
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        // Dirtying never changes topology; no re-composition needed here.
        self.state.send_prims_dirtied(self, entries);
    }

    fn prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        let mut removed = Vec::new();
        let mut added = Vec::new();
        convert_renamed_to_removed_and_added(sender, entries, &mut removed, &mut added);
        self.prims_removed(sender, &removed);
        self.prims_added(sender, &added);
    }
}

impl fmt::Debug for MergingSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergingSceneIndex")
            .field("inputs", &self.inputs.read().len())
            .finish()
    }
}
