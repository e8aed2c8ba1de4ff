// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared plumbing for one-upstream filters.

use core::fmt;

use strata_core::{EmptySceneIndex, SceneIndexRef, SceneIndexState};

/// The embedded base for a filtering scene index with exactly one upstream.
///
/// Concrete filters embed one of these, implement
/// [`SceneIndex`](strata_core::SceneIndex) by consulting
/// [`input`](Self::input), and implement
/// [`SceneIndexObserver`](strata_core::SceneIndexObserver) to translate the
/// upstream's notices into their own vocabulary. Constructors should register
/// the finished `Arc` as an observer of the input.
///
/// A missing input is a usage error, not a supported mode: it is reported and
/// an internal empty scene index is substituted so `input()` is always safe.
pub struct SingleInputBase {
    state: SceneIndexState,
    input: SceneIndexRef,
}

impl SingleInputBase {
    /// Creates base state for a filter labeled `type_label` over `input`.
    #[must_use]
    pub fn new(type_label: &'static str, input: Option<SceneIndexRef>) -> Self {
        let input = input.unwrap_or_else(|| {
            log::error!("{type_label} constructed without an input scene index; substituting an empty scene");
            EmptySceneIndex::new()
        });
        Self {
            state: SceneIndexState::new(type_label),
            input,
        }
    }

    /// The upstream scene index.
    #[must_use]
    pub fn input(&self) -> &SceneIndexRef {
        &self.input
    }

    /// The filter's own observer/label state.
    #[must_use]
    pub fn state(&self) -> &SceneIndexState {
        &self.state
    }

    /// Whether anyone observes this filter.
    ///
    /// Notice-translation hooks check this before doing nontrivial work.
    #[must_use]
    pub fn is_observed(&self) -> bool {
        self.state.is_observed()
    }
}

impl fmt::Debug for SingleInputBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleInputBase")
            .field("state", &self.state)
            .finish()
    }
}
