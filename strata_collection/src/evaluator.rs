// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Expression evaluation against a bound scene index.

use core::fmt;

use strata_core::{PrimView, SceneIndexRef};
use strata_path::ScenePath;

use crate::pattern::PathPattern;
use crate::predicate::PredicateLibrary;

/// The outcome of matching one path, with a flag for whether the outcome
/// is guaranteed constant across all descendant paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchResult {
    /// Whether the path matched the expression.
    pub matched: bool,
    /// Whether every descendant path is guaranteed the same outcome,
    /// letting a traversal skip evaluating the subtree.
    pub constant_over_descendants: bool,
}

/// How [`populate_matches`](CollectionExpressionEvaluator::populate_matches)
/// reports matches within a subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    /// Every matching path.
    MatchAll,
    /// Only the highest matching path on any branch; descendants of a match
    /// are not reported even when they match too.
    ShallowestMatches,
    /// The highest matching path on any branch plus its entire subtree,
    /// matched or not.
    ShallowestMatchesAndAllDescendants,
}

/// A compiled expression bound to a scene index and a predicate library.
///
/// Note that [`matches`](Self::matches) does not verify the queried path
/// exists: an absent path yields the placeholder prim, which a pure path
/// pattern with no predicate clause may still match. Callers that need
/// existence must check it separately; the traversal entry points only
/// visit paths the scene index actually reports.
pub struct CollectionExpressionEvaluator {
    index: SceneIndexRef,
    pattern: PathPattern,
    library: PredicateLibrary,
}

impl CollectionExpressionEvaluator {
    /// Binds `pattern` to `index`, drawing named predicates from `library`.
    #[must_use]
    pub fn new(index: SceneIndexRef, pattern: PathPattern, library: PredicateLibrary) -> Self {
        Self {
            index,
            pattern,
            library,
        }
    }

    /// The compiled expression.
    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Evaluates the expression against the prim at `path`.
    pub fn matches(&self, path: &ScenePath) -> MatchResult {
        let pattern = self.pattern.match_segments(path);
        if !pattern.matched {
            return MatchResult {
                matched: false,
                constant_over_descendants: pattern.constant_over_descendants,
            };
        }
        let Some(call) = self.pattern.predicate() else {
            return MatchResult {
                matched: true,
                constant_over_descendants: pattern.constant_over_descendants,
            };
        };
        let prim = self.index.prim(path);
        let result = self.library.evaluate(&call.name, &call.argument, &prim);
        MatchResult {
            matched: result.value,
            constant_over_descendants: pattern.constant_over_descendants
                && result.constant_over_descendants,
        }
    }

    /// Collects every match under `root` (inclusive) per `match_kind`.
    ///
    /// One serial depth-first traversal; each visited prim is evaluated at
    /// most once, so the result is duplicate-free. Subtrees are skipped
    /// wherever the per-prim outcome makes descendants' outcomes known.
    pub fn populate_matches(&self, root: &ScenePath, match_kind: MatchKind) -> Vec<ScenePath> {
        let mut result = Vec::new();
        let mut view = PrimView::new(self.index.clone(), root.clone());
        while let Some(path) = view.next() {
            let outcome = self.matches(&path);
            if outcome.matched {
                result.push(path.clone());
                let bulk_append = match match_kind {
                    MatchKind::MatchAll => outcome.constant_over_descendants,
                    MatchKind::ShallowestMatches => false,
                    MatchKind::ShallowestMatchesAndAllDescendants => true,
                };
                if bulk_append {
                    // Descendants are known-included; enumerate them
                    // directly instead of re-evaluating each.
                    let mut subtree = PrimView::new(self.index.clone(), path);
                    subtree.next();
                    result.extend(subtree);
                    view.skip_descendants();
                } else if match_kind != MatchKind::MatchAll {
                    view.skip_descendants();
                }
                // MatchAll with a varying outcome descends normally.
            } else if outcome.constant_over_descendants {
                view.skip_descendants();
            }
        }
        result
    }

    /// [`populate_matches`](Self::populate_matches) with
    /// [`MatchKind::MatchAll`].
    pub fn populate_all_matches(&self, root: &ScenePath) -> Vec<ScenePath> {
        self.populate_matches(root, MatchKind::MatchAll)
    }
}

impl fmt::Debug for CollectionExpressionEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionExpressionEvaluator")
            .field("pattern", &self.pattern)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::scene_predicate_library;
    use std::sync::Arc;
    use strata_core::{PrimEntry, RetainedSceneIndex};

    fn p(s: &str) -> ScenePath {
        s.parse().unwrap()
    }

    fn scene() -> Arc<RetainedSceneIndex> {
        let index = RetainedSceneIndex::new();
        index.add_prims(vec![
            PrimEntry::typed(p("/a"), "scope"),
            PrimEntry::typed(p("/a/foobar"), "scope"),
            PrimEntry::typed(p("/a/foobar/b"), "mesh"),
            PrimEntry::typed(p("/a/foobar/bar"), "mesh"),
            PrimEntry::typed(p("/a/foobar/baz"), "mesh"),
        ]);
        index
    }

    fn evaluator(expression: &str) -> CollectionExpressionEvaluator {
        CollectionExpressionEvaluator::new(
            scene(),
            expression.parse().unwrap(),
            scene_predicate_library(),
        )
    }

    #[test]
    fn match_kinds_over_suffix_glob() {
        let eval = evaluator("//*bar");

        assert_eq!(
            eval.populate_matches(&ScenePath::root(), MatchKind::MatchAll),
            vec![p("/a/foobar"), p("/a/foobar/bar")]
        );
        assert_eq!(
            eval.populate_matches(&ScenePath::root(), MatchKind::ShallowestMatches),
            vec![p("/a/foobar")]
        );
        assert_eq!(
            eval.populate_matches(
                &ScenePath::root(),
                MatchKind::ShallowestMatchesAndAllDescendants
            ),
            vec![
                p("/a/foobar"),
                p("/a/foobar/b"),
                p("/a/foobar/bar"),
                p("/a/foobar/baz"),
            ]
        );
    }

    #[test]
    fn constant_subtree_short_circuits() {
        let eval = evaluator("/a//");
        // Every prim under /a matches, /a included.
        assert_eq!(
            eval.populate_all_matches(&ScenePath::root()),
            vec![
                p("/a"),
                p("/a/foobar"),
                p("/a/foobar/b"),
                p("/a/foobar/bar"),
                p("/a/foobar/baz"),
            ]
        );
    }

    #[test]
    fn predicates_restrict_pattern_matches() {
        let eval = evaluator("//{type:mesh}");
        assert_eq!(
            eval.populate_all_matches(&ScenePath::root()),
            vec![p("/a/foobar/b"), p("/a/foobar/bar"), p("/a/foobar/baz")]
        );
    }

    #[test]
    fn match_does_not_require_existence() {
        let eval = evaluator("/ghost/town");
        // The prim does not exist, but a pure path pattern still matches.
        assert!(eval.matches(&p("/ghost/town")).matched);
        // Traversal only visits real prims, so the ghost never populates.
        assert!(eval.populate_all_matches(&ScenePath::root()).is_empty());
    }

    #[test]
    fn populate_respects_root_argument() {
        let eval = evaluator("//*bar");
        assert_eq!(
            eval.populate_matches(&p("/a/foobar"), MatchKind::MatchAll),
            vec![p("/a/foobar"), p("/a/foobar/bar")]
        );
    }
}
