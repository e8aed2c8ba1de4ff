// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pruning filters: hiding prims without orphaning their descendants.
//!
//! Pruning never removes a path from the topology. A pruned prim is
//! tombstoned to the placeholder value instead, so descendants that
//! survive the prune remain reachable through it.

use core::fmt;
use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::{
    AddedEntry, DirtiedEntry, Prim, RemovedEntry, RenamedEntry, SceneIndex, SceneIndexObserver,
    SceneIndexObserverRef, SceneIndexRef, SceneIndexState,
};
use strata_data::{ContainerDataSource, DataSource, DataSourceRef};
use strata_path::{ScenePath, Token};

use crate::single_input::SingleInputBase;

/// Tombstones prims by type or by path prefix.
///
/// A prim is pruned when its type is in the configured type set or its
/// path falls under one of the configured prefixes. Pruned prims read
/// back as the placeholder; their children are untouched.
pub struct PruningSceneIndex {
    base: SingleInputBase,
    prune_types: Vec<Token>,
    prune_prefixes: Vec<ScenePath>,
    // Paths announced upstream that we are currently tombstoning; used to
    // suppress dirty notices for content nobody can see.
    pruned: Mutex<BTreeSet<ScenePath>>,
}

impl PruningSceneIndex {
    /// Creates a pruning index hiding prims of the given types and prims
    /// under the given path prefixes.
    #[must_use]
    pub fn new(
        input: SceneIndexRef,
        prune_types: Vec<Token>,
        prune_prefixes: Vec<ScenePath>,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            base: SingleInputBase::new("PruningSceneIndex", Some(input)),
            prune_types,
            prune_prefixes,
            pruned: Mutex::new(BTreeSet::new()),
        });
        let observer: SceneIndexObserverRef = this.clone();
        this.base.input().state().add_observer(&observer);
        this
    }

    /// The paths currently tombstoned by this filter.
    #[must_use]
    pub fn pruned_paths(&self) -> Vec<ScenePath> {
        self.pruned.lock().iter().cloned().collect()
    }

    fn should_prune(&self, path: &ScenePath, prim_type: &Token) -> bool {
        self.prune_types.contains(prim_type)
            || self
                .prune_prefixes
                .iter()
                .any(|prefix| path.has_prefix(prefix))
    }
}

impl SceneIndex for PruningSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        let prim = self.base.input().prim(path);
        if self.should_prune(path, &prim.prim_type) {
            return Prim::placeholder();
        }
        prim
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        // Topology survives a prune.
        self.base.input().child_prim_paths(path)
    }

    fn state(&self) -> &SceneIndexState {
        self.base.state()
    }
}

impl SceneIndexObserver for PruningSceneIndex {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let mut translated = Vec::with_capacity(entries.len());
        let mut pruned = self.pruned.lock();
        for entry in entries {
            if self.should_prune(&entry.path, &entry.prim_type) {
                pruned.insert(entry.path.clone());
                translated.push(AddedEntry::new(entry.path.clone(), Token::default()));
            } else {
                // A re-add can turn a previously pruned prim back on.
                pruned.remove(&entry.path);
                translated.push(entry.clone());
            }
        }
        drop(pruned);
        self.base.state().send_prims_added(self, &translated);
    }

    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let mut pruned = self.pruned.lock();
        for entry in entries {
            let doomed: Vec<ScenePath> = pruned
                .iter()
                .filter(|path| path.has_prefix(&entry.path))
                .cloned()
                .collect();
            for path in doomed {
                pruned.remove(&path);
            }
        }
        drop(pruned);
        self.base.state().send_prims_removed(self, entries);
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        // Dirtying a tombstoned prim is invisible downstream.
        let pruned = self.pruned.lock();
        let translated: Vec<DirtiedEntry> = entries
            .iter()
            .filter(|entry| !pruned.contains(&entry.path))
            .cloned()
            .collect();
        drop(pruned);
        self.base.state().send_prims_dirtied(self, &translated);
    }

    fn prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        let mut removed = Vec::new();
        let mut added = Vec::new();
        strata_core::convert_renamed_to_removed_and_added(sender, entries, &mut removed, &mut added);
        self.prims_removed(sender, &removed);
        self.prims_added(sender, &added);
    }
}

impl fmt::Debug for PruningSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PruningSceneIndex")
            .field("prune_types", &self.prune_types)
            .field("prune_prefixes", &self.prune_prefixes)
            .finish()
    }
}

/// Tombstones material prims and strips material bindings from everything
/// else.
///
/// The pruning half reuses [`PruningSceneIndex`] semantics with a fixed
/// type set; on top of that, surviving prims have the `materialBindings`
/// child of their data source hidden so downstream consumers see a scene
/// with no materials at all.
pub struct MaterialPruningSceneIndex {
    pruning: Arc<PruningSceneIndex>,
    state: SceneIndexState,
}

impl MaterialPruningSceneIndex {
    const MATERIAL_BINDINGS: &'static str = "materialBindings";

    /// Creates a material pruning index over `input`.
    #[must_use]
    pub fn new(input: SceneIndexRef) -> Arc<Self> {
        let pruning = PruningSceneIndex::new(input, vec![Token::new("material")], Vec::new());
        let this = Arc::new(Self {
            pruning: pruning.clone(),
            state: SceneIndexState::new("MaterialPruningSceneIndex"),
        });
        let observer: SceneIndexObserverRef = this.clone();
        pruning.state().add_observer(&observer);
        this
    }
}

impl SceneIndex for MaterialPruningSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        let mut prim = self.pruning.prim(path);
        if let Some(source) = prim.data_source.take() {
            prim.data_source = Some(Arc::new(BindingStrippingSource { inner: source }) as _);
        }
        prim
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        self.pruning.child_prim_paths(path)
    }

    fn state(&self) -> &SceneIndexState {
        &self.state
    }
}

impl SceneIndexObserver for MaterialPruningSceneIndex {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        self.state.send_prims_added(self, entries);
    }

    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        self.state.send_prims_removed(self, entries);
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        self.state.send_prims_dirtied(self, entries);
    }

    fn prims_renamed(&self, _sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        self.state.send_prims_renamed(self, entries);
    }
}

impl fmt::Debug for MaterialPruningSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialPruningSceneIndex").finish()
    }
}

/// Hides the `materialBindings` child of a container.
struct BindingStrippingSource {
    inner: DataSourceRef,
}

impl DataSource for BindingStrippingSource {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        self.inner.as_container().map(|_| self as _)
    }

    fn as_sampled(&self) -> Option<&dyn strata_data::SampledDataSource> {
        self.inner.as_sampled()
    }
}

impl ContainerDataSource for BindingStrippingSource {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        if name == &Token::new(MaterialPruningSceneIndex::MATERIAL_BINDINGS) {
            return None;
        }
        self.inner.as_container()?.get(name)
    }

    fn names(&self) -> Vec<Token> {
        let bindings = Token::new(MaterialPruningSceneIndex::MATERIAL_BINDINGS);
        self.inner
            .as_container()
            .map(|container| container.names())
            .unwrap_or_default()
            .into_iter()
            .filter(|name| name != &bindings)
            .collect()
    }
}
