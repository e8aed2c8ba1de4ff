// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Propagation of prototype contents under their instancers.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use strata_core::{
    convert_renamed_to_removed_and_added, AddedEntry, DirtiedEntry, EmptySceneIndex, Prim,
    PrimView, RemovedEntry, RenamedEntry, SceneIndex, SceneIndexObserver, SceneIndexObserverRef,
    SceneIndexRef, SceneIndexState,
};
use strata_filter::{MergingSceneIndex, RerootingSceneIndex};
use strata_path::{ScenePath, Token};

use crate::aggregation::InstanceAggregationSceneIndex;
use crate::info::{prototype_name_from_instancer_path, PROTOTYPE_NAME};

/// Shares one prepared prototype scene per prototype name.
///
/// Prepared scenes are held weakly: they stay alive exactly as long as some
/// instancer's merge entry references them, and the next instancer of the
/// same prototype reuses the live scene instead of rebuilding it.
struct SubgraphCache {
    /// The un-scoped scene every prototype subtree is read from.
    world: SceneIndexRef,
    prepared: Mutex<BTreeMap<Token, Weak<PrototypePropagatingSceneIndex>>>,
    /// Names whose prepared scene is mid-construction. A name re-entering
    /// here means the prototype instances itself, directly or through a
    /// cycle of prototypes.
    building: Mutex<Vec<Token>>,
}

impl SubgraphCache {
    fn prototype_scene(self: &Arc<Self>, name: &Token) -> SceneIndexRef {
        if let Some(live) = self.prepared.lock().get(name).and_then(Weak::upgrade) {
            return live;
        }
        {
            let mut building = self.building.lock();
            if building.contains(name) {
                log::error!(
                    "prototype {:?} participates in an instancing cycle; \
                     presenting it as empty",
                    name.as_str()
                );
                return EmptySceneIndex::new();
            }
            building.push(name.clone());
        }
        let root = ScenePath::root().append(name.clone());
        // Isolate the prototype subtree so sibling scene content does not
        // leak into the propagated copy.
        let isolated: SceneIndexRef =
            RerootingSceneIndex::new(self.world.clone(), root.clone(), root.clone());
        let scene = PrototypePropagatingSceneIndex::inside_prototype(isolated, root, self.clone());
        self.prepared.lock().insert(name.clone(), Arc::downgrade(&scene));
        self.building.lock().retain(|built| built != name);
        scene
    }
}

/// One instancer's contribution to the merge. Dropping the entry detaches
/// the re-rooted prototype scene from the merge.
struct MergeEntry {
    merging: Arc<MergingSceneIndex>,
    scene: SceneIndexRef,
}

impl Drop for MergeEntry {
    fn drop(&mut self) {
        self.merging.remove_input_scene(&self.scene);
    }
}

/// Watches the aggregation stage and keeps one merged prototype subtree
/// alive per instancer.
struct PropagationDriver {
    merging: Arc<MergingSceneIndex>,
    cache: Arc<SubgraphCache>,
    entries: Mutex<BTreeMap<ScenePath, MergeEntry>>,
}

impl PropagationDriver {
    fn track_instancer(&self, instancer: &ScenePath) {
        let Some(name) = prototype_name_from_instancer_path(instancer) else {
            return;
        };
        if self.entries.lock().contains_key(instancer) {
            return;
        }
        let prepared = self.cache.prototype_scene(&name);
        let destination = instancer.append(Token::new(PROTOTYPE_NAME));
        let rerooted: SceneIndexRef = RerootingSceneIndex::new(
            prepared,
            ScenePath::root().append(name),
            destination.clone(),
        );
        self.merging
            .add_input_scene(rerooted.clone(), destination);
        self.entries.lock().insert(
            instancer.clone(),
            MergeEntry {
                merging: self.merging.clone(),
                scene: rerooted,
            },
        );
    }

    /// Picks up instancers the aggregation synthesized before this driver
    /// was registered.
    fn attach_existing(&self, aggregation: &Arc<InstanceAggregationSceneIndex>) {
        let mut view = PrimView::from_root(aggregation.clone());
        while let Some(path) = view.next() {
            self.track_instancer(&path);
        }
    }
}

impl SceneIndexObserver for PropagationDriver {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        for entry in entries {
            self.track_instancer(&entry.path);
        }
    }

    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        // Drain outside the map lock; dropping an entry re-enters the merge.
        let mut dropped = Vec::new();
        {
            let mut tracked = self.entries.lock();
            for entry in entries {
                let doomed: Vec<ScenePath> = tracked
                    .keys()
                    .filter(|path| path.has_prefix(&entry.path))
                    .cloned()
                    .collect();
                for path in doomed {
                    if let Some(merge_entry) = tracked.remove(&path) {
                        dropped.push(merge_entry);
                    }
                }
            }
        }
        drop(dropped);
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, _entries: &[DirtiedEntry]) {
        // Dirt flows to consumers through the merge's own observation.
    }

    fn prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        let mut removed = Vec::new();
        let mut added = Vec::new();
        convert_renamed_to_removed_and_added(sender, entries, &mut removed, &mut added);
        self.prims_removed(sender, &removed);
        self.prims_added(sender, &added);
    }
}

/// Presents the input scene with every prototype's contents propagated
/// under the instancers that reference it.
///
/// Composition over the input: the aggregation stage's synthesized
/// hierarchy is merged in, and beneath each instancer a re-rooted copy of
/// the prototype subtree appears at `<instancer>/Prototype`. Prototypes
/// containing instances themselves are propagated recursively; prototype
/// scenes are shared between instancers of the same prototype.
pub struct PrototypePropagatingSceneIndex {
    state: SceneIndexState,
    merging: Arc<MergingSceneIndex>,
    driver: Arc<PropagationDriver>,
}

impl PrototypePropagatingSceneIndex {
    /// Creates a propagating stage over `input`.
    pub fn new(input: SceneIndexRef) -> Arc<Self> {
        let cache = Arc::new(SubgraphCache {
            world: input.clone(),
            prepared: Mutex::new(BTreeMap::new()),
            building: Mutex::new(Vec::new()),
        });
        Self::build(input, None, cache)
    }

    fn inside_prototype(
        isolated: SceneIndexRef,
        prototype_root: ScenePath,
        cache: Arc<SubgraphCache>,
    ) -> Arc<Self> {
        Self::build(isolated, Some(prototype_root), cache)
    }

    fn build(
        input: SceneIndexRef,
        prototype_root: Option<ScenePath>,
        cache: Arc<SubgraphCache>,
    ) -> Arc<Self> {
        let merging = MergingSceneIndex::new();
        merging.add_input_scene(input.clone(), ScenePath::root());
        let aggregation = InstanceAggregationSceneIndex::with_fallback_root(input, prototype_root);
        let driver = Arc::new(PropagationDriver {
            merging: merging.clone(),
            cache,
            entries: Mutex::new(BTreeMap::new()),
        });
        let observer: SceneIndexObserverRef = driver.clone();
        aggregation.state().add_observer(&observer);
        driver.attach_existing(&aggregation);
        merging.add_input_scene(aggregation, ScenePath::root());

        let this = Arc::new(Self {
            state: SceneIndexState::new("PrototypePropagatingSceneIndex"),
            merging: merging.clone(),
            driver,
        });
        let forwarder: SceneIndexObserverRef = this.clone();
        merging.state().add_observer(&forwarder);
        this
    }
}

impl fmt::Debug for PrototypePropagatingSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrototypePropagatingSceneIndex")
            .field("tracked_instancers", &self.driver.entries.lock().len())
            .finish()
    }
}

impl SceneIndex for PrototypePropagatingSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        self.merging.prim(path)
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        self.merging.child_prim_paths(path)
    }

    fn state(&self) -> &SceneIndexState {
        &self.state
    }
}

impl SceneIndexObserver for PrototypePropagatingSceneIndex {
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

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{PrimEntry, RetainedSceneIndex};
    use strata_data::{value_at_locator, RetainedContainer, RetainedValue, Value};
    use strata_path::Locator;

    fn p(s: &str) -> ScenePath {
        s.parse().unwrap()
    }

    fn instance_source(prototype: &str, material: &str) -> strata_data::DataSourceRef {
        RetainedContainer::builder()
            .set(
                "primInfo",
                RetainedContainer::builder()
                    .set(
                        "prototypePath",
                        RetainedValue::new(Value::Path(p(prototype))),
                    )
                    .build(),
            )
            .set(
                "materialBindings",
                RetainedContainer::builder()
                    .set("allPurpose", RetainedValue::new(Value::Path(p(material))))
                    .build(),
            )
            .build()
    }

    fn scene_with_prototype() -> Arc<RetainedSceneIndex> {
        let input = RetainedSceneIndex::new();
        input.add_prims(vec![
            PrimEntry::typed(p("/Proto"), "scope"),
            PrimEntry::new(
                p("/Proto/Geom"),
                "mesh",
                Some(
                    RetainedContainer::builder()
                        .set("points", RetainedValue::new(Value::Int(8)))
                        .build(),
                ),
            ),
            PrimEntry::new(
                p("/World/Cube1"),
                "instance",
                Some(instance_source("/Proto", "/Looks/steel")),
            ),
        ]);
        input
    }

    fn sole_instancer(index: &PrototypePropagatingSceneIndex) -> ScenePath {
        let scopes = index.child_prim_paths(&p("/PropagatedPrototypes"));
        assert_eq!(scopes.len(), 1);
        let protos = index.child_prim_paths(&scopes[0]);
        assert_eq!(protos.len(), 1);
        protos[0].append("Instancer")
    }

    #[test]
    fn prototype_contents_appear_under_the_instancer() {
        let input = scene_with_prototype();
        let index = PrototypePropagatingSceneIndex::new(input);

        let instancer = sole_instancer(&index);
        assert_eq!(index.prim(&instancer).prim_type, Token::new("instancer"));

        let geom = instancer.append("Prototype").append("Geom");
        let prim = index.prim(&geom);
        assert_eq!(prim.prim_type, Token::new("mesh"));
        assert_eq!(
            value_at_locator(prim.data_source.as_ref(), &Locator::from_names(["points"])),
            Some(Value::Int(8))
        );

        // The input scene still shows through the merge.
        assert_eq!(index.prim(&p("/Proto/Geom")).prim_type, Token::new("mesh"));
        assert!(index
            .prim(&p("/World/Cube1"))
            .data_source
            .is_some());
    }

    #[test]
    fn last_instance_removal_detaches_the_prototype_copy() {
        let input = scene_with_prototype();
        let index = PrototypePropagatingSceneIndex::new(input.clone());
        let geom = sole_instancer(&index).append("Prototype").append("Geom");
        assert_eq!(index.prim(&geom).prim_type, Token::new("mesh"));

        input.remove_prims(vec![RemovedEntry::new(p("/World/Cube1"))]);

        assert!(index.prim(&geom).is_placeholder());
        assert!(index
            .child_prim_paths(&p("/PropagatedPrototypes"))
            .is_empty());
        // The prototype itself is untouched.
        assert_eq!(index.prim(&p("/Proto/Geom")).prim_type, Token::new("mesh"));
    }

    #[test]
    fn instancers_of_one_prototype_share_its_scene() {
        let input = scene_with_prototype();
        // A second instance with different bindings lands on a second
        // instancer, both presenting the same prototype contents.
        input.add_prims(vec![PrimEntry::new(
            p("/World/Cube2"),
            "instance",
            Some(instance_source("/Proto", "/Looks/brass")),
        )]);
        let index = PrototypePropagatingSceneIndex::new(input);

        let scopes = index.child_prim_paths(&p("/PropagatedPrototypes"));
        assert_eq!(scopes.len(), 2);
        for scope in scopes {
            let geom = scope
                .append("Proto")
                .append("Instancer")
                .append("Prototype")
                .append("Geom");
            assert_eq!(index.prim(&geom).prim_type, Token::new("mesh"));
        }
    }

    #[test]
    fn nested_instances_propagate_recursively() {
        let input = scene_with_prototype();
        input.add_prims(vec![
            PrimEntry::typed(p("/Leaf"), "scope"),
            PrimEntry::new(
                p("/Leaf/Geom"),
                "mesh",
                Some(
                    RetainedContainer::builder()
                        .set("points", RetainedValue::new(Value::Int(4)))
                        .build(),
                ),
            ),
            // An instance inside the prototype itself.
            PrimEntry::new(
                p("/Proto/Inner"),
                "instance",
                Some(instance_source("/Leaf", "/Looks/steel")),
            ),
        ]);
        let index = PrototypePropagatingSceneIndex::new(input);

        let prototype_copy = sole_instancer_for(&index, &ScenePath::root(), "Proto")
            .append("Prototype");
        let nested_scope = prototype_copy.append("PropagatedPrototypes");
        let nested = sole_instancer_for(&index, &prototype_copy, "Leaf");
        assert!(!index.child_prim_paths(&nested_scope).is_empty());
        assert_eq!(index.prim(&nested).prim_type, Token::new("instancer"));
        assert_eq!(
            index
                .prim(&nested.append("Prototype").append("Geom"))
                .prim_type,
            Token::new("mesh")
        );
    }

    fn sole_instancer_for(
        index: &PrototypePropagatingSceneIndex,
        root: &ScenePath,
        prototype: &str,
    ) -> ScenePath {
        let scope = root.append("PropagatedPrototypes");
        let hashes = index.child_prim_paths(&scope);
        assert_eq!(hashes.len(), 1);
        hashes[0].append(prototype).append("Instancer")
    }
}
