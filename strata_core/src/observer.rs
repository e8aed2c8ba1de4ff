// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The observer side of the notification protocol.

use std::sync::Arc;

use crate::index::SceneIndex;
use crate::notices::{AddedEntry, DirtiedEntry, RemovedEntry, RenamedEntry};

/// A shared handle to an observer.
pub type SceneIndexObserverRef = Arc<dyn SceneIndexObserver>;

/// A sink for scene-index notices.
///
/// Observers are registered weakly (see
/// [`SceneIndexState::add_observer`](crate::SceneIndexState::add_observer));
/// the emitting index never extends an observer's lifetime. Within one batch,
/// entries arrive in the order the emitting layer constructed them, and a
/// layer fully processes one incoming notice before the next is dispatched to
/// it.
///
/// `prims_renamed` is required; observers without true rename semantics
/// implement it via [`convert_renamed_to_removed_and_added`] and feed the
/// results to their own removed/added handling.
pub trait SceneIndexObserver: Send + Sync + 'static {
    /// Prims were added (or re-announced) by `sender`.
    fn prims_added(&self, sender: &dyn SceneIndex, entries: &[AddedEntry]);

    /// Subtrees were removed by `sender`.
    fn prims_removed(&self, sender: &dyn SceneIndex, entries: &[RemovedEntry]);

    /// Prim data sources were dirtied by `sender`.
    fn prims_dirtied(&self, sender: &dyn SceneIndex, entries: &[DirtiedEntry]);

    /// Subtrees were renamed by `sender`.
    fn prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]);
}

/// Reduces rename notices to removes plus adds.
///
/// For each rename this emits a remove for the old path, then an add for the
/// new path and every descendant reachable at the new location, with types
/// re-queried from `sender`. The sender has already performed the rename, so
/// the new subtree is queryable; anything about the *old* subtree beyond its
/// root is unrecoverable here and must have been captured by the component
/// that performed the rename, if it needs full before-state fidelity.
pub fn convert_renamed_to_removed_and_added(
    sender: &dyn SceneIndex,
    entries: &[RenamedEntry],
    removed: &mut Vec<RemovedEntry>,
    added: &mut Vec<AddedEntry>,
) {
    for entry in entries {
        removed.push(RemovedEntry::new(entry.old_path.clone()));
        add_subtree(sender, &entry.new_path, added);
    }
}

fn add_subtree(sender: &dyn SceneIndex, path: &strata_path::ScenePath, added: &mut Vec<AddedEntry>) {
    added.push(AddedEntry::new(path.clone(), sender.prim(path).prim_type));
    for child in sender.child_prim_paths(path) {
        add_subtree(sender, &child, added);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retained::{PrimEntry, RetainedSceneIndex};
    use strata_path::ScenePath;

    fn p(s: &str) -> ScenePath {
        s.parse().unwrap()
    }

    #[test]
    fn rename_reduces_to_remove_plus_subtree_add() {
        let index = RetainedSceneIndex::new();
        index.add_prims(vec![
            PrimEntry::typed(p("/b"), "scope"),
            PrimEntry::typed(p("/b/x"), "mesh"),
            PrimEntry::typed(p("/b/x/y"), "mesh"),
        ]);

        // Pretend /a was renamed to /b; the sender already reflects /b.
        let mut removed = Vec::new();
        let mut added = Vec::new();
        convert_renamed_to_removed_and_added(
            &*index,
            &[RenamedEntry::new(p("/a"), p("/b"))],
            &mut removed,
            &mut added,
        );

        assert_eq!(removed, vec![RemovedEntry::new(p("/a"))]);
        assert_eq!(
            added,
            vec![
                AddedEntry::new(p("/b"), "scope"),
                AddedEntry::new(p("/b/x"), "mesh"),
                AddedEntry::new(p("/b/x/y"), "mesh"),
            ]
        );
    }
}
