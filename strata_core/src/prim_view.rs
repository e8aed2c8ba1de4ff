// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lazy depth-first prim traversal.

use core::fmt;

use strata_path::ScenePath;

use crate::index::SceneIndexRef;

/// A lazy, depth-first, prunable traversal over a scene index's child edges.
///
/// The view yields the root path first, then descends. Children are fetched
/// freshly from the index one level at a time; nothing is enumerated ahead of
/// the cursor. After receiving an element, the caller may invoke
/// [`skip_descendants`](Self::skip_descendants) to prevent the next step from
/// descending into it — the standard way to bound traversal cost once a
/// subtree is known to be irrelevant.
///
/// The view holds a strong reference to the scene index for its lifetime.
/// Mutating the underlying scene during an in-progress traversal is not
/// supported; `child_prim_paths` must be stable for the duration.
///
/// Two views compare equal iff their remaining traversal stacks are
/// structurally equal; a default-constructed view is the exhausted sentinel.
///
/// ```
/// use strata_core::{PrimEntry, PrimView, RetainedSceneIndex};
/// use strata_path::ScenePath;
///
/// let index = RetainedSceneIndex::new();
/// index.add_prims(vec![
///     PrimEntry::typed("/a".parse().unwrap(), "scope"),
///     PrimEntry::typed("/a/b".parse().unwrap(), "mesh"),
/// ]);
/// let paths: Vec<String> = PrimView::from_root(index.clone())
///     .map(|p| p.to_string())
///     .collect();
/// assert_eq!(paths, ["/", "/a", "/a/b"]);
/// ```
#[derive(Clone)]
pub struct PrimView {
    index: Option<SceneIndexRef>,
    stack: Vec<Frame>,
    skip: bool,
    started: bool,
}

#[derive(Clone, PartialEq)]
struct Frame {
    paths: Vec<ScenePath>,
    pos: usize,
}

impl Frame {
    fn current(&self) -> &ScenePath {
        &self.paths[self.pos]
    }
}

impl PrimView {
    /// Traversal of the whole scene, rooted at `/`.
    #[must_use]
    pub fn from_root(index: SceneIndexRef) -> Self {
        Self::new(index, ScenePath::root())
    }

    /// Traversal rooted at `root`.
    #[must_use]
    pub fn new(index: SceneIndexRef, root: ScenePath) -> Self {
        Self {
            index: Some(index),
            stack: vec![Frame {
                paths: vec![root],
                pos: 0,
            }],
            skip: false,
            started: false,
        }
    }

    /// Do not descend into the most recently yielded element.
    ///
    /// Call at most once per yielded element, before the next iteration step.
    pub fn skip_descendants(&mut self) {
        self.skip = true;
    }

    fn current(&self) -> Option<ScenePath> {
        self.stack.last().map(|frame| frame.current().clone())
    }

    // One step of the C-style "advance" operation: descend unless pruned,
    // else move to the next sibling, popping exhausted frames.
    fn advance(&mut self) -> Option<ScenePath> {
        let descend = !self.skip;
        self.skip = false;

        if descend {
            let current = self.current()?;
            let children = self
                .index
                .as_ref()
                .map(|index| index.child_prim_paths(&current))
                .unwrap_or_default();
            if !children.is_empty() {
                self.stack.push(Frame {
                    paths: children,
                    pos: 0,
                });
                return self.current();
            }
        }

        while let Some(frame) = self.stack.last_mut() {
            frame.pos += 1;
            if frame.pos < frame.paths.len() {
                return self.current();
            }
            self.stack.pop();
        }
        None
    }
}

impl Default for PrimView {
    /// The exhausted ("end") view.
    fn default() -> Self {
        Self {
            index: None,
            stack: Vec::new(),
            skip: false,
            started: true,
        }
    }
}

impl Iterator for PrimView {
    type Item = ScenePath;

    fn next(&mut self) -> Option<ScenePath> {
        if !self.started {
            self.started = true;
            return self.current();
        }
        self.advance()
    }
}

impl PartialEq for PrimView {
    fn eq(&self, other: &Self) -> bool {
        // Structural equality of the remaining traversal; an exhausted view
        // equals the default sentinel regardless of which index it came from.
        self.stack == other.stack
    }
}

impl fmt::Debug for PrimView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimView")
            .field("depth", &self.stack.len())
            .field("current", &self.current())
            .finish()
    }
}
