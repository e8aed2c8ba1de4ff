// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The re-rooting (prefix-remapping) scene index.

use core::fmt;
use std::sync::Arc;

use strata_core::{
    AddedEntry, DirtiedEntry, Prim, RemovedEntry, RenamedEntry, SceneIndex, SceneIndexObserver,
    SceneIndexObserverRef, SceneIndexRef, SceneIndexState,
};
use strata_data::{
    ContainerDataSource, DataSource, DataSourceRef, OverlayContainer, SampledDataSource, Value,
};
use strata_path::{ScenePath, Token};

use crate::single_input::SingleInputBase;

/// Presents the upstream subtree at `src_prefix` as if rooted at
/// `dst_prefix`, hiding everything else.
///
/// Every exposed path, and every path-valued field inside exposed data
/// sources, is rewritten by prefix replacement. Rewriting is lazy: container
/// children are re-wrapped as they are visited, never deep-copied, and a
/// path-array whose entries all fall outside `src_prefix` is passed through
/// untouched.
///
/// Three regimes are distinguished at construction: `src == dst` (pure
/// isolation, no data rewriting at all), `src` is the absolute root (pure
/// prefixing, no membership filtering of upstream notices), and general
/// relocation.
pub struct RerootingSceneIndex {
    base: SingleInputBase,
    src_prefix: ScenePath,
    dst_prefix: ScenePath,
    src_equals_dst: bool,
    src_is_root: bool,
    system_source: Option<DataSourceRef>,
}

impl RerootingSceneIndex {
    /// Creates a re-rooting index over `input`.
    #[must_use]
    pub fn new(input: SceneIndexRef, src_prefix: ScenePath, dst_prefix: ScenePath) -> Arc<Self> {
        Self::with_system_source(input, src_prefix, dst_prefix, None)
    }

    /// Like [`new`](Self::new), additionally overlaying `system_source` onto
    /// the prim at exactly `dst_prefix` (contextual "system" data for the
    /// re-rooted subtree).
    #[must_use]
    pub fn with_system_source(
        input: SceneIndexRef,
        src_prefix: ScenePath,
        dst_prefix: ScenePath,
        system_source: Option<DataSourceRef>,
    ) -> Arc<Self> {
        let this = Arc::new(Self {
            base: SingleInputBase::new("RerootingSceneIndex", Some(input)),
            src_equals_dst: src_prefix == dst_prefix,
            src_is_root: src_prefix.is_root(),
            src_prefix,
            dst_prefix,
            system_source,
        });
        let observer: SceneIndexObserverRef = this.clone();
        this.base.input().state().add_observer(&observer);
        this
    }

    /// The prefix being re-rooted from.
    #[must_use]
    pub fn src_prefix(&self) -> &ScenePath {
        &self.src_prefix
    }

    /// The prefix being re-rooted to.
    #[must_use]
    pub fn dst_prefix(&self) -> &ScenePath {
        &self.dst_prefix
    }

    fn dst_to_src(&self, path: &ScenePath) -> Option<ScenePath> {
        if self.src_equals_dst {
            return path.has_prefix(&self.dst_prefix).then(|| path.clone());
        }
        path.replace_prefix(&self.dst_prefix, &self.src_prefix)
    }

    fn src_to_dst(&self, path: &ScenePath) -> Option<ScenePath> {
        if self.src_equals_dst {
            return path.has_prefix(&self.src_prefix).then(|| path.clone());
        }
        path.replace_prefix(&self.src_prefix, &self.dst_prefix)
    }

    fn wrap(&self, source: DataSourceRef) -> DataSourceRef {
        if self.src_equals_dst {
            return source;
        }
        PathRewriter::wrap(source, self.src_prefix.clone(), self.dst_prefix.clone())
    }
}

impl SceneIndex for RerootingSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        let Some(src_path) = self.dst_to_src(path) else {
            return Prim::placeholder();
        };
        let upstream = self.base.input().prim(&src_path);
        let mut data_source = upstream.data_source.map(|source| self.wrap(source));
        if *path == self.dst_prefix {
            if let Some(system) = &self.system_source {
                data_source = Some(match data_source {
                    Some(inner) => OverlayContainer::over(inner, system.clone()),
                    None => system.clone(),
                });
            }
        }
        Prim {
            prim_type: upstream.prim_type,
            data_source,
        }
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        if let Some(src_path) = self.dst_to_src(path) {
            return self
                .base
                .input()
                .child_prim_paths(&src_path)
                .iter()
                .filter_map(|child| self.src_to_dst(child))
                .collect();
        }
        // Above the destination prefix: synthesize the single hop toward it.
        match path.child_toward(&self.dst_prefix) {
            Some(hop) => vec![hop],
            None => Vec::new(),
        }
    }

    fn state(&self) -> &SceneIndexState {
        self.base.state()
    }
}

impl SceneIndexObserver for RerootingSceneIndex {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let translated: Vec<AddedEntry> = entries
            .iter()
            .filter_map(|entry| {
                self.src_to_dst(&entry.path)
                    .map(|path| AddedEntry::new(path, entry.prim_type.clone()))
            })
            .collect();
        self.base.state().send_prims_added(self, &translated);
    }

    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let mut translated = Vec::new();
        for entry in entries {
            if let Some(path) = self.src_to_dst(&entry.path) {
                translated.push(RemovedEntry::new(path));
            } else if !self.src_is_root && self.src_prefix.has_proper_prefix(&entry.path) {
                // The source subtree's root was removed from above; collapse
                // the whole batch into one removal of our destination root.
                self.base
                    .state()
                    .send_prims_removed(self, &[RemovedEntry::new(self.dst_prefix.clone())]);
                return;
            }
        }
        self.base.state().send_prims_removed(self, &translated);
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let translated: Vec<DirtiedEntry> = entries
            .iter()
            .filter_map(|entry| {
                self.src_to_dst(&entry.path)
                    .map(|path| DirtiedEntry::new(path, entry.locators.clone()))
            })
            .collect();
        self.base.state().send_prims_dirtied(self, &translated);
    }

    fn prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let mut renamed = Vec::new();
        let mut removed = Vec::new();
        let mut added = Vec::new();
        for entry in entries {
            match (
                self.src_to_dst(&entry.old_path),
                self.src_to_dst(&entry.new_path),
            ) {
                (Some(old_path), Some(new_path)) => {
                    renamed.push(RenamedEntry::new(old_path, new_path));
                }
                (Some(old_path), None) => removed.push(RemovedEntry::new(old_path)),
                (None, Some(new_path)) => {
                    // Moved into our window: announce the subtree at its new
                    // location.
                    let src_new = entry.new_path.clone();
                    collect_mapped_subtree(self, sender, &src_new, &new_path, &mut added);
                }
                (None, None) => {}
            }
        }
        self.base.state().send_prims_renamed(self, &renamed);
        self.base.state().send_prims_removed(self, &removed);
        self.base.state().send_prims_added(self, &added);
    }
}

fn collect_mapped_subtree(
    index: &RerootingSceneIndex,
    sender: &dyn SceneIndex,
    src_path: &ScenePath,
    dst_path: &ScenePath,
    added: &mut Vec<AddedEntry>,
) {
    added.push(AddedEntry::new(
        dst_path.clone(),
        sender.prim(src_path).prim_type,
    ));
    for child in sender.child_prim_paths(src_path) {
        if let Some(mapped) = index.src_to_dst(&child) {
            collect_mapped_subtree(index, sender, &child, &mapped, added);
        }
    }
}

impl fmt::Debug for RerootingSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RerootingSceneIndex")
            .field("src_prefix", &self.src_prefix)
            .field("dst_prefix", &self.dst_prefix)
            .finish()
    }
}

/// Lazily rewrites path-valued fields as a data-source tree is traversed.
///
/// Container children are re-wrapped transitively on access; sampled leaves
/// have `Path` values prefix-replaced and `PathVec` values element-wise
/// replaced, with an early-out returning the original array when no element
/// carries the prefix.
struct PathRewriter {
    inner: DataSourceRef,
    src_prefix: ScenePath,
    dst_prefix: ScenePath,
}

impl PathRewriter {
    fn wrap(inner: DataSourceRef, src_prefix: ScenePath, dst_prefix: ScenePath) -> DataSourceRef {
        Arc::new(Self {
            inner,
            src_prefix,
            dst_prefix,
        })
    }

    fn rewrite_path(&self, path: &ScenePath) -> ScenePath {
        path.replace_prefix(&self.src_prefix, &self.dst_prefix)
            .unwrap_or_else(|| path.clone())
    }
}

impl DataSource for PathRewriter {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        self.inner.as_container().map(|_| self as _)
    }

    fn as_sampled(&self) -> Option<&dyn SampledDataSource> {
        self.inner.as_sampled().map(|_| self as _)
    }
}

impl ContainerDataSource for PathRewriter {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        let child = self.inner.as_container()?.get(name)?;
        Some(Self::wrap(
            child,
            self.src_prefix.clone(),
            self.dst_prefix.clone(),
        ))
    }

    fn names(&self) -> Vec<Token> {
        self.inner
            .as_container()
            .map(|container| container.names())
            .unwrap_or_default()
    }
}

impl SampledDataSource for PathRewriter {
    fn value(&self, shutter_offset: f64) -> Value {
        let Some(sampled) = self.inner.as_sampled() else {
            return Value::Bool(false);
        };
        let value = sampled.value(shutter_offset);
        match value {
            Value::Path(path) => Value::Path(self.rewrite_path(&path)),
            Value::PathVec(paths) => {
                // Common case: nothing in the array is under the prefix;
                // return it unmodified.
                if !paths.iter().any(|p| p.has_prefix(&self.src_prefix)) {
                    return Value::PathVec(paths);
                }
                Value::PathVec(paths.iter().map(|p| self.rewrite_path(p)).collect())
            }
            other => other,
        }
    }

    fn sample_times_in_interval(&self, start: f64, end: f64) -> Vec<f64> {
        self.inner
            .as_sampled()
            .map(|sampled| sampled.sample_times_in_interval(start, end))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{p, Recorder};
    use strata_core::{PrimEntry, RetainedSceneIndex};
    use strata_data::{value_at_locator, RetainedContainer, RetainedValue};
    use strata_path::{Locator, LocatorSet};

    fn source_scene() -> std::sync::Arc<RetainedSceneIndex> {
        let index = RetainedSceneIndex::new();
        index.add_prims(vec![
            PrimEntry::typed(p("/src"), "scope"),
            PrimEntry::new(
                p("/src/geo"),
                "mesh",
                Some(
                    RetainedContainer::builder()
                        .set("target", RetainedValue::new(Value::Path(p("/src/sibling"))))
                        .set(
                            "targets",
                            RetainedValue::new(Value::PathVec(vec![
                                p("/src/sibling"),
                                p("/elsewhere"),
                            ])),
                        )
                        .build(),
                ),
            ),
            PrimEntry::typed(p("/src/sibling"), "mesh"),
            PrimEntry::typed(p("/other"), "mesh"),
        ]);
        index
    }

    #[test]
    fn round_trip_maps_prims_and_path_fields() {
        let scene = source_scene();
        let rerooted = RerootingSceneIndex::new(scene.clone(), p("/src"), p("/dst/deep"));

        let prim = rerooted.prim(&p("/dst/deep/geo"));
        assert_eq!(prim.prim_type, Token::new("mesh"));
        assert_eq!(
            value_at_locator(prim.data_source.as_ref(), &Locator::from_names(["target"])),
            Some(Value::Path(p("/dst/deep/sibling")))
        );
        // Array fields are rewritten element-wise; entries outside the
        // source prefix pass through.
        assert_eq!(
            value_at_locator(prim.data_source.as_ref(), &Locator::from_names(["targets"])),
            Some(Value::PathVec(vec![p("/dst/deep/sibling"), p("/elsewhere")]))
        );
    }

    #[test]
    fn everything_outside_dst_is_hidden() {
        let rerooted = RerootingSceneIndex::new(source_scene(), p("/src"), p("/dst"));
        assert!(rerooted.prim(&p("/other")).is_placeholder());
        assert!(rerooted.prim(&p("/src/geo")).is_placeholder());
        assert!(!rerooted.prim(&p("/dst/geo")).is_placeholder());
    }

    #[test]
    fn ancestors_of_dst_synthesize_one_hop() {
        let rerooted = RerootingSceneIndex::new(source_scene(), p("/src"), p("/dst/deep"));
        assert_eq!(rerooted.child_prim_paths(&ScenePath::root()), vec![p("/dst")]);
        assert_eq!(rerooted.child_prim_paths(&p("/dst")), vec![p("/dst/deep")]);
        let mut kids = rerooted.child_prim_paths(&p("/dst/deep"));
        kids.sort();
        assert_eq!(kids, vec![p("/dst/deep/geo"), p("/dst/deep/sibling")]);
    }

    #[test]
    fn notices_are_filtered_and_remapped() {
        let scene = source_scene();
        let rerooted = RerootingSceneIndex::new(scene.clone(), p("/src"), p("/dst"));
        let (recorder, _keep) = Recorder::attach(&*rerooted);

        scene.add_prims(vec![
            PrimEntry::typed(p("/src/new"), "mesh"),
            PrimEntry::typed(p("/unrelated"), "mesh"),
        ]);
        assert_eq!(recorder.added_paths(), vec![p("/dst/new")]);

        scene.dirty_prims(vec![DirtiedEntry::new(
            p("/src/geo"),
            LocatorSet::universal(),
        )]);
        assert_eq!(recorder.dirtied_paths(), vec![p("/dst/geo")]);
    }

    #[test]
    fn removal_above_src_collapses_to_dst_removal() {
        let nested = RetainedSceneIndex::new();
        nested.add_prims(vec![PrimEntry::typed(p("/a/b/src"), "scope")]);
        let rerooted = RerootingSceneIndex::new(nested.clone(), p("/a/b/src"), p("/dst"));
        let (recorder, _keep) = Recorder::attach(&*rerooted);

        nested.remove_prims(vec![RemovedEntry::new(p("/a"))]);
        assert_eq!(recorder.removed_paths(), vec![p("/dst")]);
    }

    #[test]
    fn src_equals_dst_isolates_without_rewriting() {
        let scene = source_scene();
        let isolated = RerootingSceneIndex::new(scene, p("/src"), p("/src"));
        assert!(isolated.prim(&p("/other")).is_placeholder());
        let prim = isolated.prim(&p("/src/geo"));
        // No rewriting: the original data source is passed through.
        assert_eq!(
            value_at_locator(prim.data_source.as_ref(), &Locator::from_names(["target"])),
            Some(Value::Path(p("/src/sibling")))
        );
    }

    #[test]
    fn system_source_overlays_at_dst_root_only() {
        let scene = source_scene();
        let system = RetainedContainer::builder()
            .set("frame", RetainedValue::new(Value::Int(42)))
            .build();
        let rerooted = RerootingSceneIndex::with_system_source(
            scene,
            p("/src"),
            p("/dst"),
            Some(system),
        );
        let root_prim = rerooted.prim(&p("/dst"));
        assert_eq!(
            value_at_locator(root_prim.data_source.as_ref(), &Locator::from_names(["frame"])),
            Some(Value::Int(42))
        );
        let child_prim = rerooted.prim(&p("/dst/geo"));
        assert_eq!(
            value_at_locator(child_prim.data_source.as_ref(), &Locator::from_names(["frame"])),
            None
        );
    }
}
