// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The no-op scene index.

use std::sync::Arc;

use strata_path::ScenePath;

use crate::index::{SceneIndex, SceneIndexState};
use crate::prim::Prim;

/// A scene index with no prims and no children anywhere.
///
/// Used as the defensive substitute for a missing upstream: filters built
/// without a real input degrade to filtering this instead of dereferencing
/// nothing. It still carries full observer machinery (which never fires).
#[derive(Debug)]
pub struct EmptySceneIndex {
    state: SceneIndexState,
}

impl EmptySceneIndex {
    /// Creates an empty scene index.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: SceneIndexState::new("EmptySceneIndex"),
        })
    }
}

impl SceneIndex for EmptySceneIndex {
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
