// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferral and replay of change notices.

use core::fmt;
use std::sync::Arc;

use log::error;
use parking_lot::Mutex;
use strata_core::{
    AddedEntry, DirtiedEntry, Prim, RemovedEntry, RenamedEntry, SceneIndex, SceneIndexObserver,
    SceneIndexObserverRef, SceneIndexRef, SceneIndexState,
};
use strata_path::ScenePath;

use crate::single_input::SingleInputBase;

/// One queued upstream batch, preserved whole so replay keeps both the
/// kind-ordering and the intra-batch ordering of arrival.
enum QueuedBatch {
    Added(Vec<AddedEntry>),
    Removed(Vec<RemovedEntry>),
    Dirtied(Vec<DirtiedEntry>),
    Renamed(Vec<RenamedEntry>),
}

/// Passes prim queries straight through while optionally holding back
/// change notices.
///
/// Between [`begin_batching`](Self::begin_batching) and the matching
/// [`end_batching`](Self::end_batching), upstream notices are queued instead
/// of forwarded. The calls nest; queued notices replay in arrival order when
/// the outermost scope ends. Outside a batching scope the index is a
/// transparent pass-through.
///
/// Note that queries answered while a batch is held open see the input's
/// present state, which may be ahead of what downstream observers have been
/// told. Downstream must not interleave pulls with held notices if it needs
/// the two planes to agree.
pub struct NoticeBatchingSceneIndex {
    base: SingleInputBase,
    depth: Mutex<usize>,
    queue: Mutex<Vec<QueuedBatch>>,
}

impl NoticeBatchingSceneIndex {
    /// Creates a batching index over `input`.
    #[must_use]
    pub fn new(input: SceneIndexRef) -> Arc<Self> {
        let this = Arc::new(Self {
            base: SingleInputBase::new("NoticeBatchingSceneIndex", Some(input)),
            depth: Mutex::new(0),
            queue: Mutex::new(Vec::new()),
        });
        let observer: SceneIndexObserverRef = this.clone();
        this.base.input().state().add_observer(&observer);
        this
    }

    /// Opens a batching scope. Nests.
    pub fn begin_batching(&self) {
        *self.depth.lock() += 1;
    }

    /// Closes one batching scope; replays the queue when the outermost
    /// scope closes.
    pub fn end_batching(&self) {
        let flush = {
            let mut depth = self.depth.lock();
            if *depth == 0 {
                error!("end_batching without a matching begin_batching");
                return;
            }
            *depth -= 1;
            *depth == 0
        };
        if flush {
            self.flush();
        }
    }

    /// Whether a batching scope is currently open.
    #[must_use]
    pub fn is_batching(&self) -> bool {
        *self.depth.lock() > 0
    }

    fn flush(&self) {
        let queued = core::mem::take(&mut *self.queue.lock());
        let state = self.base.state();
        for batch in queued {
            match batch {
                QueuedBatch::Added(entries) => state.send_prims_added(self, &entries),
                QueuedBatch::Removed(entries) => state.send_prims_removed(self, &entries),
                QueuedBatch::Dirtied(entries) => state.send_prims_dirtied(self, &entries),
                QueuedBatch::Renamed(entries) => state.send_prims_renamed(self, &entries),
            }
        }
    }
}

impl SceneIndex for NoticeBatchingSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        self.base.input().prim(path)
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        self.base.input().child_prim_paths(path)
    }

    fn state(&self) -> &SceneIndexState {
        self.base.state()
    }
}

impl SceneIndexObserver for NoticeBatchingSceneIndex {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        if self.is_batching() {
            self.queue.lock().push(QueuedBatch::Added(entries.to_vec()));
        } else if self.base.is_observed() {
            self.base.state().send_prims_added(self, entries);
        }
    }

    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        if self.is_batching() {
            self.queue
                .lock()
                .push(QueuedBatch::Removed(entries.to_vec()));
        } else if self.base.is_observed() {
            self.base.state().send_prims_removed(self, entries);
        }
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        if self.is_batching() {
            self.queue
                .lock()
                .push(QueuedBatch::Dirtied(entries.to_vec()));
        } else if self.base.is_observed() {
            self.base.state().send_prims_dirtied(self, entries);
        }
    }

    fn prims_renamed(&self, _sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        if self.is_batching() {
            self.queue
                .lock()
                .push(QueuedBatch::Renamed(entries.to_vec()));
        } else if self.base.is_observed() {
            self.base.state().send_prims_renamed(self, entries);
        }
    }
}

impl fmt::Debug for NoticeBatchingSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoticeBatchingSceneIndex")
            .field("batching", &self.is_batching())
            .finish()
    }
}
