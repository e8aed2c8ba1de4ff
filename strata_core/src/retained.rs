// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The retained (directly populated) scene index.

use core::fmt;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use strata_data::DataSourceRef;
use strata_path::{ScenePath, Token};

use crate::index::{SceneIndex, SceneIndexState};
use crate::notices::{AddedEntry, DirtiedEntry, RemovedEntry};
use crate::prim::Prim;

/// Input entry for [`RetainedSceneIndex::add_prims`].
#[derive(Clone)]
pub struct PrimEntry {
    /// The prim's path.
    pub path: ScenePath,
    /// The prim's type.
    pub prim_type: Token,
    /// The prim's data source, if any.
    pub data_source: Option<DataSourceRef>,
}

impl PrimEntry {
    /// An entry with a type and data source.
    #[must_use]
    pub fn new(
        path: ScenePath,
        prim_type: impl Into<Token>,
        data_source: Option<DataSourceRef>,
    ) -> Self {
        Self {
            path,
            prim_type: prim_type.into(),
            data_source,
        }
    }

    /// An entry with a type and no data source.
    #[must_use]
    pub fn typed(path: ScenePath, prim_type: impl Into<Token>) -> Self {
        Self::new(path, prim_type, None)
    }
}

impl fmt::Debug for PrimEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimEntry")
            .field("path", &self.path)
            .field("prim_type", &self.prim_type)
            .field("has_data_source", &self.data_source.is_some())
            .finish()
    }
}

#[derive(Clone)]
struct Stored {
    prim_type: Token,
    data_source: Option<DataSourceRef>,
}

/// A concrete, mutable, in-memory store of prims keyed by path.
///
/// Entries live in an ordered map whose key order is the paths' depth-first
/// order, so subtree operations are contiguous range operations and
/// [`child_prim_paths`](SceneIndex::child_prim_paths) is deterministic
/// (children in name order). Ancestors are never materialized: `prim` on an
/// unstored ancestor returns the placeholder, while child enumeration still
/// reaches stored descendants because the store is keyed by full path.
///
/// The index is the leaf "source of truth" node in most graphs; the mutation
/// API ([`add_prims`](Self::add_prims), [`remove_prims`](Self::remove_prims),
/// [`dirty_prims`](Self::dirty_prims)) emits the corresponding notices
/// inline, after the store mutation is complete, so observers re-entering
/// with queries see the new state.
pub struct RetainedSceneIndex {
    state: SceneIndexState,
    entries: RwLock<BTreeMap<ScenePath, Stored>>,
}

impl RetainedSceneIndex {
    /// Creates an empty retained scene index.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: SceneIndexState::new("RetainedSceneIndex"),
            entries: RwLock::new(BTreeMap::new()),
        })
    }

    /// Upserts prim entries and notifies observers.
    ///
    /// Within one call, a later entry for the same path wins. One added
    /// notice is emitted per input entry even when the stored value did not
    /// change; callers needing change-dedup must dedup before calling.
    pub fn add_prims(&self, entries: impl IntoIterator<Item = PrimEntry>) {
        let mut notices = Vec::new();
        {
            let mut store = self.entries.write();
            for entry in entries {
                notices.push(AddedEntry::new(entry.path.clone(), entry.prim_type.clone()));
                store.insert(
                    entry.path,
                    Stored {
                        prim_type: entry.prim_type,
                        data_source: entry.data_source,
                    },
                );
            }
        }
        self.state.send_prims_added(self, &notices);
    }

    /// Erases the subtree at each entry's path and notifies observers.
    ///
    /// The given entries are forwarded verbatim: a removed notice stands for
    /// its whole subtree, so descendants are implied, not enumerated.
    pub fn remove_prims(&self, entries: impl IntoIterator<Item = RemovedEntry>) {
        let notices: Vec<RemovedEntry> = entries.into_iter().collect();
        {
            let mut store = self.entries.write();
            for entry in &notices {
                let doomed: Vec<ScenePath> = store
                    .range::<ScenePath, _>((Bound::Included(&entry.path), Bound::Unbounded))
                    .take_while(|(path, _)| path.has_prefix(&entry.path))
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in doomed {
                    store.remove(&path);
                }
            }
        }
        self.state.send_prims_removed(self, &notices);
    }

    /// Forwards dirty notices for paths present in the store.
    ///
    /// Entries whose path has no stored prim are filtered out (existence is
    /// the only check; values are not compared). The store may sit beneath
    /// several logical scenes, and a blanket dirty must not leak into
    /// subtrees this store does not own.
    pub fn dirty_prims(&self, entries: impl IntoIterator<Item = DirtiedEntry>) {
        let notices: Vec<DirtiedEntry> = {
            let store = self.entries.read();
            entries
                .into_iter()
                .filter(|entry| store.contains_key(&entry.path))
                .collect()
        };
        self.state.send_prims_dirtied(self, &notices);
    }
}

impl SceneIndex for RetainedSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        match self.entries.read().get(path) {
            Some(stored) => Prim {
                prim_type: stored.prim_type.clone(),
                data_source: stored.data_source.clone(),
            },
            None => Prim::placeholder(),
        }
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        let store = self.entries.read();
        let mut children: Vec<ScenePath> = Vec::new();
        for (key, _) in store
            .range::<ScenePath, _>((Bound::Excluded(path), Bound::Unbounded))
            .take_while(|(key, _)| key.has_prefix(path))
        {
            // Implicit ancestors count: the child edge exists as soon as any
            // stored path passes through it.
            let child = key.truncated(path.depth() + 1);
            if children.last() != Some(&child) {
                children.push(child);
            }
        }
        children
    }

    fn state(&self) -> &SceneIndexState {
        &self.state
    }
}

impl fmt::Debug for RetainedSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainedSceneIndex")
            .field("entries", &self.entries.read().len())
            .finish()
    }
}
