// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test support: a notice-recording observer.

use std::sync::Arc;

use parking_lot::Mutex;

use strata_core::{
    AddedEntry, DirtiedEntry, RemovedEntry, RenamedEntry, SceneIndex, SceneIndexObserver,
    SceneIndexObserverRef,
};
use strata_path::ScenePath;

/// Records every notice it receives.
#[derive(Default)]
pub(crate) struct Recorder {
    pub added: Mutex<Vec<AddedEntry>>,
    pub removed: Mutex<Vec<RemovedEntry>>,
    pub dirtied: Mutex<Vec<DirtiedEntry>>,
    pub renamed: Mutex<Vec<RenamedEntry>>,
}

impl Recorder {
    /// Creates a recorder and registers it with `index`.
    ///
    /// The returned `SceneIndexObserverRef` must be kept alive for the
    /// registration to stay live.
    pub fn attach(index: &dyn SceneIndex) -> (Arc<Self>, SceneIndexObserverRef) {
        let recorder = Arc::new(Self::default());
        let as_ref: SceneIndexObserverRef = recorder.clone();
        index.state().add_observer(&as_ref);
        (recorder, as_ref)
    }

    pub fn added_paths(&self) -> Vec<ScenePath> {
        self.added.lock().iter().map(|e| e.path.clone()).collect()
    }

    pub fn removed_paths(&self) -> Vec<ScenePath> {
        self.removed.lock().iter().map(|e| e.path.clone()).collect()
    }

    pub fn dirtied_paths(&self) -> Vec<ScenePath> {
        self.dirtied.lock().iter().map(|e| e.path.clone()).collect()
    }

    pub fn clear(&self) {
        self.added.lock().clear();
        self.removed.lock().clear();
        self.dirtied.lock().clear();
        self.renamed.lock().clear();
    }
}

impl SceneIndexObserver for Recorder {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        self.added.lock().extend_from_slice(entries);
    }
    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        self.removed.lock().extend_from_slice(entries);
    }
    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        self.dirtied.lock().extend_from_slice(entries);
    }
    fn prims_renamed(&self, _sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        self.renamed.lock().extend_from_slice(entries);
    }
}

/// Parses a path literal.
pub(crate) fn p(s: &str) -> ScenePath {
    s.parse().unwrap()
}
