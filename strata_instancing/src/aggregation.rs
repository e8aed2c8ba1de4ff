// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Aggregation of equivalent instances onto synthesized instancers.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use strata_core::{
    convert_renamed_to_removed_and_added, AddedEntry, DirtiedEntry, Prim, PrimEntry, PrimView,
    RemovedEntry, RenamedEntry, RetainedSceneIndex, SceneIndex, SceneIndexObserver,
    SceneIndexObserverRef, SceneIndexRef, SceneIndexState,
};
use strata_data::{
    locator_get, value_at_locator, ContainerDataSource, DataSource, DataSourceRef,
    RetainedContainer, RetainedValue, SampledDataSource, Value,
};
use strata_path::{Locator, LocatorSet, ScenePath, Token};

use crate::info::{
    compute_binding_hash, constant_primvar_names, enclosing_root_of, prototype_path_of,
    InstanceInfo, PROPAGATED_PROTOTYPES_SCOPE,
};

/// Per-instancer membership, shared with the instancer's data source so
/// lazy topology reads always see current membership.
type InstanceSet = Arc<Mutex<BTreeSet<ScenePath>>>;

#[derive(Default)]
struct Tables {
    /// enclosing root -> binding hash -> prototype name -> instances.
    grouped: BTreeMap<ScenePath, BTreeMap<Token, BTreeMap<Token, InstanceSet>>>,
    instance_to_info: BTreeMap<ScenePath, InstanceInfo>,
    /// Instance indices per instancer, built on first query and reset
    /// whenever membership changes. `None` means not built.
    index_cache: BTreeMap<ScenePath, Option<Arc<BTreeMap<ScenePath, i64>>>>,
}

/// How far a removal unwinds the synthesized hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RemovalLevel {
    /// Other instances remain on the instancer.
    Instance,
    /// The instancer lost its last instance.
    Instancer,
    /// The binding scope lost its last instancer.
    BindingScope,
    /// The enclosing root lost its last binding scope.
    EnclosingRoot,
}

/// Store mutations computed under the table lock, applied after it drops.
/// Applying inline would dispatch notices while the lock is held, and a
/// downstream pull re-entering a lazy instance source would deadlock.
enum StoreOp {
    Add(Vec<PrimEntry>),
    Remove(Vec<RemovedEntry>),
    Dirty(Vec<DirtiedEntry>),
}

fn instance_locator_set() -> LocatorSet {
    LocatorSet::from_locators([Locator::from_names(["instance"])])
}

fn instancer_refresh_locators() -> LocatorSet {
    LocatorSet::from_locators([
        Locator::from_names(["instancerTopology", "instanceIndices"]),
        Locator::from_names(["instancerTopology", "instanceLocations"]),
        Locator::from_names(["instancerTopology", "mask"]),
        Locator::from_names(["primvars", "instanceTransform"]),
    ])
}

/// Locators whose change can re-key an instance: the grouping key reads all
/// of these, so any of them forces reclassification.
fn resync_locators() -> LocatorSet {
    LocatorSet::from_locators([
        Locator::from_names(["instancedBy"]),
        Locator::from_names(["materialBindings"]),
        Locator::from_names(["primInfo", "prototypePath"]),
        Locator::from_names(["purpose"]),
    ])
}

/// Watches the input scene and maintains the synthesized instancer
/// hierarchy in an owned retained store.
struct InstanceObserver {
    input: SceneIndexRef,
    /// The enclosing root to assume for instances that do not author one.
    /// Set when this stage aggregates inside a propagated prototype.
    fallback_root: Option<ScenePath>,
    store: Arc<RetainedSceneIndex>,
    tables: Mutex<Tables>,
    weak_self: Weak<Self>,
}

impl InstanceObserver {
    fn new(input: SceneIndexRef, fallback_root: Option<ScenePath>) -> Arc<Self> {
        let this = Arc::new_cyclic(|weak| Self {
            input: input.clone(),
            fallback_root,
            store: RetainedSceneIndex::new(),
            tables: Mutex::new(Tables::default()),
            weak_self: weak.clone(),
        });
        let observer: SceneIndexObserverRef = this.clone();
        input.state().add_observer(&observer);
        let mut view = PrimView::from_root(input);
        while let Some(path) = view.next() {
            this.resync(&path);
        }
        this
    }

    fn classify(&self, prim: &Prim) -> Option<InstanceInfo> {
        let prototype = prototype_path_of(prim)?;
        let enclosing_root = enclosing_root_of(prim)
            .or_else(|| self.fallback_root.clone())
            .unwrap_or_else(ScenePath::root);
        Some(InstanceInfo {
            enclosing_root,
            binding_hash: compute_binding_hash(prim),
            prototype_name: prototype.name(),
        })
    }

    /// Reclassifies one path against the input and reconciles the tables
    /// and the store with the result.
    fn resync(&self, path: &ScenePath) {
        let prim = self.input.prim(path);
        let new_info = self.classify(&prim);
        let mut ops = Vec::new();
        {
            let mut tables = self.tables.lock();
            let old_info = tables.instance_to_info.get(path).cloned();
            match (old_info, new_info) {
                (None, None) => {}
                (None, Some(info)) => {
                    self.add_instance(&mut tables, info, path, &prim, &mut ops);
                }
                (Some(old), None) => {
                    self.remove_instance(&mut tables, &old, path, &mut ops);
                }
                (Some(old), Some(new)) => {
                    if old != new {
                        self.remove_instance(&mut tables, &old, path, &mut ops);
                        self.add_instance(&mut tables, new, path, &prim, &mut ops);
                    }
                }
            }
        }
        self.apply(ops);
    }

    fn add_instance(
        &self,
        tables: &mut Tables,
        info: InstanceInfo,
        path: &ScenePath,
        prim: &Prim,
        ops: &mut Vec<StoreOp>,
    ) {
        tables.instance_to_info.insert(path.clone(), info.clone());
        let (new_scope, new_instancer, instances) = {
            let by_hash = tables.grouped.entry(info.enclosing_root.clone()).or_default();
            let new_scope = !by_hash.contains_key(&info.binding_hash);
            let by_proto = by_hash.entry(info.binding_hash.clone()).or_default();
            let new_instancer = !by_proto.contains_key(&info.prototype_name);
            let instances = by_proto
                .entry(info.prototype_name.clone())
                .or_insert_with(|| Arc::new(Mutex::new(BTreeSet::new())))
                .clone();
            instances.lock().insert(path.clone());
            (new_scope, new_instancer, instances)
        };

        let mut added = Vec::new();
        if new_scope {
            added.push(PrimEntry::new(
                info.binding_scope_path(),
                "scope",
                binding_copy(prim),
            ));
        }
        if new_instancer {
            added.push(PrimEntry::typed(info.base_path(), "scope"));
            added.push(PrimEntry::new(
                info.instancer_path(),
                "instancer",
                Some(Arc::new(InstancerSource {
                    input: self.input.clone(),
                    info: info.clone(),
                    instances,
                })),
            ));
            tables.index_cache.insert(info.instancer_path(), None);
        } else {
            self.invalidate_indices(tables, &info.instancer_path(), ops);
            ops.push(StoreOp::Dirty(vec![DirtiedEntry::new(
                info.instancer_path(),
                instancer_refresh_locators(),
            )]));
        }
        added.push(PrimEntry::new(
            path.clone(),
            Token::empty(),
            Some(Arc::new(InstanceSource {
                observer: self.weak_self.clone(),
                path: path.clone(),
            })),
        ));
        ops.push(StoreOp::Add(added));
    }

    fn remove_instance(
        &self,
        tables: &mut Tables,
        info: &InstanceInfo,
        path: &ScenePath,
        ops: &mut Vec<StoreOp>,
    ) {
        tables.instance_to_info.remove(path);
        ops.push(StoreOp::Remove(vec![RemovedEntry::new(path.clone())]));
        let level = {
            let Some(by_hash) = tables.grouped.get_mut(&info.enclosing_root) else {
                return;
            };
            let Some(by_proto) = by_hash.get_mut(&info.binding_hash) else {
                return;
            };
            let emptied = match by_proto.get(&info.prototype_name) {
                Some(instances) => {
                    let mut instances = instances.lock();
                    instances.remove(path);
                    instances.is_empty()
                }
                None => return,
            };
            if !emptied {
                RemovalLevel::Instance
            } else {
                by_proto.remove(&info.prototype_name);
                if !by_proto.is_empty() {
                    RemovalLevel::Instancer
                } else {
                    by_hash.remove(&info.binding_hash);
                    if !by_hash.is_empty() {
                        RemovalLevel::BindingScope
                    } else {
                        RemovalLevel::EnclosingRoot
                    }
                }
            }
        };
        match level {
            RemovalLevel::Instance => {
                self.invalidate_indices(tables, &info.instancer_path(), ops);
                ops.push(StoreOp::Dirty(vec![DirtiedEntry::new(
                    info.instancer_path(),
                    instancer_refresh_locators(),
                )]));
            }
            RemovalLevel::Instancer => {
                tables.index_cache.remove(&info.instancer_path());
                ops.push(StoreOp::Remove(vec![RemovedEntry::new(info.base_path())]));
            }
            RemovalLevel::BindingScope => {
                tables.index_cache.remove(&info.instancer_path());
                ops.push(StoreOp::Remove(vec![RemovedEntry::new(
                    info.binding_scope_path(),
                )]));
            }
            RemovalLevel::EnclosingRoot => {
                tables.grouped.remove(&info.enclosing_root);
                tables.index_cache.remove(&info.instancer_path());
                ops.push(StoreOp::Remove(vec![RemovedEntry::new(
                    info.enclosing_root
                        .append(Token::new(PROPAGATED_PROTOTYPES_SCOPE)),
                )]));
            }
        }
    }

    /// Drops the instancer's index cache. Instances whose index was already
    /// handed out are dirtied so consumers re-pull; never-queried instances
    /// stay quiet.
    fn invalidate_indices(
        &self,
        tables: &mut Tables,
        instancer: &ScenePath,
        ops: &mut Vec<StoreOp>,
    ) {
        if let Some(slot) = tables.index_cache.get_mut(instancer) {
            if let Some(cached) = slot.take() {
                let dirtied: Vec<DirtiedEntry> = cached
                    .keys()
                    .map(|path| DirtiedEntry::new(path.clone(), instance_locator_set()))
                    .collect();
                ops.push(StoreOp::Dirty(dirtied));
            }
        }
    }

    /// The instance's position on its instancer, building the index cache
    /// on first use. Indices follow path order within the instancer, so
    /// they are stable across rebuilds of identical membership.
    fn instance_index_of(&self, path: &ScenePath) -> Option<i64> {
        let mut tables = self.tables.lock();
        let info = tables.instance_to_info.get(path).cloned()?;
        let instances = tables
            .grouped
            .get(&info.enclosing_root)?
            .get(&info.binding_hash)?
            .get(&info.prototype_name)?
            .clone();
        let slot = tables.index_cache.entry(info.instancer_path()).or_insert(None);
        if slot.is_none() {
            let indexed: BTreeMap<ScenePath, i64> =
                instances.lock().iter().cloned().zip(0..).collect();
            *slot = Some(Arc::new(indexed));
        }
        slot.as_ref().and_then(|indexed| indexed.get(path).copied())
    }

    fn instancer_path_of(&self, path: &ScenePath) -> Option<ScenePath> {
        let tables = self.tables.lock();
        Some(tables.instance_to_info.get(path)?.instancer_path())
    }

    fn apply(&self, ops: Vec<StoreOp>) {
        for op in ops {
            match op {
                StoreOp::Add(entries) => self.store.add_prims(entries),
                StoreOp::Remove(entries) => self.store.remove_prims(entries),
                StoreOp::Dirty(entries) => self.store.dirty_prims(entries),
            }
        }
    }
}

impl SceneIndexObserver for InstanceObserver {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        for entry in entries {
            self.resync(&entry.path);
        }
    }

    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        // Resync re-queries the input, sees the placeholder, and unwinds.
        let doomed: Vec<ScenePath> = {
            let tables = self.tables.lock();
            entries
                .iter()
                .flat_map(|entry| {
                    tables
                        .instance_to_info
                        .keys()
                        .filter(|path| path.has_prefix(&entry.path))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .collect()
        };
        for path in doomed {
            self.resync(&path);
        }
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        let resync = resync_locators();
        let mut resync_paths = Vec::new();
        let mut ops = Vec::new();
        {
            let tables = self.tables.lock();
            for entry in entries {
                let Some(info) = tables.instance_to_info.get(&entry.path).cloned() else {
                    continue;
                };
                if entry.locators.intersects_set(&resync) {
                    resync_paths.push(entry.path.clone());
                    continue;
                }
                if entry.locators.intersects(&Locator::from_names(["xform"])) {
                    ops.push(StoreOp::Dirty(vec![DirtiedEntry::new(
                        info.instancer_path(),
                        LocatorSet::from_locators([Locator::from_names([
                            "primvars",
                            "instanceTransform",
                        ])]),
                    )]));
                }
                if entry.locators.intersects(&Locator::from_names(["visibility"])) {
                    ops.push(StoreOp::Dirty(vec![DirtiedEntry::new(
                        info.instancer_path(),
                        LocatorSet::from_locators([Locator::from_names([
                            "instancerTopology",
                            "mask",
                        ])]),
                    )]));
                }
                for locator in entry.locators.iter() {
                    let parts = locator.parts();
                    if parts.first().is_none_or(|part| part.as_str() != "primvars") {
                        continue;
                    }
                    if parts.len() >= 3 && parts[2].as_str() == "value" {
                        // Value-only edit of a constant primvar lands on the
                        // shared binding copy without re-keying anything.
                        ops.push(StoreOp::Dirty(vec![DirtiedEntry::new(
                            info.binding_scope_path(),
                            LocatorSet::from_locators([Locator::from_names(["primvars"])
                                .append(parts[1].clone())]),
                        )]));
                    } else {
                        // Interpolation or role edits change the grouping key.
                        resync_paths.push(entry.path.clone());
                        break;
                    }
                }
            }
        }
        self.apply(ops);
        for path in resync_paths {
            self.resync(&path);
        }
    }

    fn prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        let mut removed = Vec::new();
        let mut added = Vec::new();
        convert_renamed_to_removed_and_added(sender, entries, &mut removed, &mut added);
        self.prims_removed(sender, &removed);
        self.prims_added(sender, &added);
    }
}

/// Rendering-relevant bindings copied from the first instance onto the
/// shared binding scope. Sub-sources are shared, not deep-copied.
fn binding_copy(prim: &Prim) -> Option<DataSourceRef> {
    let mut builder = RetainedContainer::builder();
    for name in ["materialBindings", "purpose"] {
        if let Some(child) = locator_get(prim.data_source.as_ref(), &Locator::from_names([name])) {
            builder = builder.set(name, child);
        }
    }
    let constant = constant_primvar_names(prim);
    if !constant.is_empty() {
        let mut primvars = RetainedContainer::builder();
        for name in constant {
            if let Some(child) = locator_get(
                prim.data_source.as_ref(),
                &Locator::from_names(["primvars"]).append(name.clone()),
            ) {
                primvars = primvars.set(name, child);
            }
        }
        builder = builder.set("primvars", primvars.build());
    }
    Some(builder.build())
}

fn identity() -> [[f64; 4]; 4] {
    let mut m = [[0.0; 4]; 4];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

/// The synthesized instancer prim's data source. Topology and transforms
/// are computed from live membership on every pull.
struct InstancerSource {
    input: SceneIndexRef,
    info: InstanceInfo,
    instances: InstanceSet,
}

impl InstancerSource {
    fn member_paths(&self) -> Vec<ScenePath> {
        self.instances.lock().iter().cloned().collect()
    }

    fn topology(&self) -> DataSourceRef {
        let members = self.member_paths();
        let indices: Vec<i64> = (0..).take(members.len()).collect();
        let mask: Vec<i64> = members
            .iter()
            .map(|path| {
                let visible = value_at_locator(
                    self.input.prim(path).data_source.as_ref(),
                    &Locator::from_names(["visibility", "visible"]),
                )
                .and_then(|value| value.as_bool())
                .unwrap_or(true);
                i64::from(visible)
            })
            .collect();
        RetainedContainer::builder()
            .set(
                "prototypes",
                RetainedValue::new(Value::PathVec(vec![self.info.prototype_path()])),
            )
            .set(
                "instanceIndices",
                RetainedValue::new(Value::IntVec(indices)),
            )
            .set(
                "instanceLocations",
                RetainedValue::new(Value::PathVec(members.clone())),
            )
            .set("mask", RetainedValue::new(Value::IntVec(mask)))
            .build()
    }

    fn primvars(&self) -> DataSourceRef {
        let transforms: Vec<[[f64; 4]; 4]> = self
            .member_paths()
            .iter()
            .map(|path| {
                match value_at_locator(
                    self.input.prim(path).data_source.as_ref(),
                    &Locator::from_names(["xform", "matrix"]),
                ) {
                    Some(Value::Matrix(m)) => m,
                    _ => identity(),
                }
            })
            .collect();
        RetainedContainer::builder()
            .set(
                "instanceTransform",
                RetainedContainer::builder()
                    .set(
                        "interpolation",
                        RetainedValue::new(Value::Token(Token::new("instance"))),
                    )
                    .set("value", RetainedValue::new(Value::MatrixVec(transforms)))
                    .build(),
            )
            .build()
    }
}

impl DataSource for InstancerSource {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        Some(self)
    }
}

impl ContainerDataSource for InstancerSource {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        match name.as_str() {
            "instancerTopology" => Some(self.topology()),
            "primvars" => Some(self.primvars()),
            _ => None,
        }
    }

    fn names(&self) -> Vec<Token> {
        vec![Token::new("instancerTopology"), Token::new("primvars")]
    }
}

/// The data source presented at an instance's own path: a pointer back to
/// the instancer and the instance's position on it.
///
/// Holds the observer weakly. The observer owns the store, the store holds
/// this source; a strong reference here would keep the whole stage alive
/// through its own output.
struct InstanceSource {
    observer: Weak<InstanceObserver>,
    path: ScenePath,
}

impl DataSource for InstanceSource {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        Some(self)
    }
}

impl ContainerDataSource for InstanceSource {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        if name.as_str() != "instance" {
            return None;
        }
        let observer = self.observer.upgrade()?;
        let instancer = observer.instancer_path_of(&self.path)?;
        Some(
            RetainedContainer::builder()
                .set("instancer", RetainedValue::new(Value::Path(instancer)))
                .set("prototypeIndex", RetainedValue::new(Value::Int(0)))
                .set(
                    "instanceIndex",
                    Arc::new(InstanceIndexSource {
                        observer: self.observer.clone(),
                        path: self.path.clone(),
                    }),
                )
                .build(),
        )
    }

    fn names(&self) -> Vec<Token> {
        vec![Token::new("instance")]
    }
}

/// Deferred index lookup so aggregating N instances stays O(N); positions
/// are only assigned when somebody asks.
struct InstanceIndexSource {
    observer: Weak<InstanceObserver>,
    path: ScenePath,
}

impl DataSource for InstanceIndexSource {
    fn as_sampled(&self) -> Option<&dyn SampledDataSource> {
        Some(self)
    }
}

impl SampledDataSource for InstanceIndexSource {
    fn value(&self, _shutter_offset: f64) -> Value {
        let index = self
            .observer
            .upgrade()
            .and_then(|observer| observer.instance_index_of(&self.path))
            .unwrap_or(0);
        Value::Int(index)
    }
}

/// Groups equivalent instances onto synthesized instancers.
///
/// Two instances land on the same instancer when they reference the same
/// prototype with the same rendering-relevant bindings inside the same
/// enclosing prototype context. The output scene contains only what this
/// stage synthesizes: the per-hash binding scopes, the instancers, and one
/// entry per instance carrying its `instance` pointer. A propagating stage
/// merges this over the input scene.
pub struct InstanceAggregationSceneIndex {
    state: SceneIndexState,
    observer: Arc<InstanceObserver>,
}

impl InstanceAggregationSceneIndex {
    /// Creates an aggregation stage over `input`.
    pub fn new(input: SceneIndexRef) -> Arc<Self> {
        Self::with_fallback_root(input, None)
    }

    /// Like [`new`](Self::new), but instances that do not author an
    /// enclosing prototype root are attributed to `fallback_root` instead
    /// of the absolute root. Used when aggregating inside a propagated
    /// prototype subtree.
    pub fn with_fallback_root(
        input: SceneIndexRef,
        fallback_root: Option<ScenePath>,
    ) -> Arc<Self> {
        let observer = InstanceObserver::new(input, fallback_root);
        let this = Arc::new(Self {
            state: SceneIndexState::new("InstanceAggregationSceneIndex"),
            observer,
        });
        let forwarder: SceneIndexObserverRef = this.clone();
        this.observer.store.state().add_observer(&forwarder);
        this
    }
}

impl fmt::Debug for InstanceAggregationSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceAggregationSceneIndex")
            .field(
                "instances",
                &self.observer.tables.lock().instance_to_info.len(),
            )
            .finish()
    }
}

impl SceneIndex for InstanceAggregationSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        self.observer.store.prim(path)
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        self.observer.store.child_prim_paths(path)
    }

    fn state(&self) -> &SceneIndexState {
        &self.state
    }
}

impl SceneIndexObserver for InstanceAggregationSceneIndex {
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

    fn p(s: &str) -> ScenePath {
        s.parse().unwrap()
    }

    fn instance_source(prototype: &str, material: &str) -> DataSourceRef {
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

    fn populated_input() -> Arc<RetainedSceneIndex> {
        let input = RetainedSceneIndex::new();
        input.add_prims(vec![
            PrimEntry::typed(p("/World"), "scope"),
            PrimEntry::new(
                p("/World/Cube1"),
                "instance",
                Some(instance_source("/Proto", "/Looks/steel")),
            ),
            PrimEntry::new(
                p("/World/Cube2"),
                "instance",
                Some(instance_source("/Proto", "/Looks/steel")),
            ),
        ]);
        input
    }

    fn hash_scopes(index: &InstanceAggregationSceneIndex) -> Vec<ScenePath> {
        index.child_prim_paths(&p("/PropagatedPrototypes"))
    }

    fn sole_instancer(index: &InstanceAggregationSceneIndex) -> ScenePath {
        let scopes = hash_scopes(index);
        assert_eq!(scopes.len(), 1);
        let protos = index.child_prim_paths(&scopes[0]);
        assert_eq!(protos.len(), 1);
        protos[0].append("Instancer")
    }

    fn instance_index(index: &InstanceAggregationSceneIndex, path: &str) -> i64 {
        value_at_locator(
            index.prim(&p(path)).data_source.as_ref(),
            &Locator::from_names(["instance", "instanceIndex"]),
        )
        .and_then(|value| value.as_int())
        .unwrap()
    }

    #[test]
    fn equivalent_instances_share_one_instancer() {
        let input = populated_input();
        let index = InstanceAggregationSceneIndex::new(input);

        let instancer = sole_instancer(&index);
        assert_eq!(index.prim(&instancer).prim_type, Token::new("instancer"));
        let locations = value_at_locator(
            index.prim(&instancer).data_source.as_ref(),
            &Locator::from_names(["instancerTopology", "instanceLocations"]),
        );
        assert_eq!(
            locations,
            Some(Value::PathVec(vec![p("/World/Cube1"), p("/World/Cube2")]))
        );
        let instance = value_at_locator(
            index.prim(&p("/World/Cube1")).data_source.as_ref(),
            &Locator::from_names(["instance", "instancer"]),
        );
        assert_eq!(instance, Some(Value::Path(instancer)));
    }

    #[test]
    fn differing_bindings_split_instancers() {
        let input = populated_input();
        let index = InstanceAggregationSceneIndex::new(input.clone());
        assert_eq!(hash_scopes(&index).len(), 1);

        input.add_prims(vec![PrimEntry::new(
            p("/World/Cube3"),
            "instance",
            Some(instance_source("/Proto", "/Looks/brass")),
        )]);
        assert_eq!(hash_scopes(&index).len(), 2);
    }

    #[test]
    fn binding_change_moves_instance_between_instancers() {
        use parking_lot::Mutex as PMutex;

        #[derive(Default)]
        struct Dirties(PMutex<Vec<DirtiedEntry>>);
        impl SceneIndexObserver for Dirties {
            fn prims_added(&self, _: &dyn SceneIndex, _: &[AddedEntry]) {}
            fn prims_removed(&self, _: &dyn SceneIndex, _: &[RemovedEntry]) {}
            fn prims_dirtied(&self, _: &dyn SceneIndex, entries: &[DirtiedEntry]) {
                self.0.lock().extend(entries.iter().cloned());
            }
            fn prims_renamed(&self, _: &dyn SceneIndex, _: &[RenamedEntry]) {}
        }

        let input = populated_input();
        let index = InstanceAggregationSceneIndex::new(input.clone());
        let before = sole_instancer(&index);
        let recorder = Arc::new(Dirties::default());
        let observer: SceneIndexObserverRef = recorder.clone();
        index.state().add_observer(&observer);

        input.add_prims(vec![PrimEntry::new(
            p("/World/Cube2"),
            "instance",
            Some(instance_source("/Proto", "/Looks/brass")),
        )]);

        // The shrunken instancer hears about its changed topology.
        assert!(recorder.0.lock().iter().any(|e| e.path == before
            && e.locators
                .intersects(&Locator::from_names(["primvars", "instanceTransform"]))));

        let scopes = hash_scopes(&index);
        assert_eq!(scopes.len(), 2);
        let locations = value_at_locator(
            index.prim(&before).data_source.as_ref(),
            &Locator::from_names(["instancerTopology", "instanceLocations"]),
        );
        assert_eq!(locations, Some(Value::PathVec(vec![p("/World/Cube1")])));
        let new_instancer = value_at_locator(
            index.prim(&p("/World/Cube2")).data_source.as_ref(),
            &Locator::from_names(["instance", "instancer"]),
        )
        .and_then(|value| value.as_path().cloned())
        .unwrap();
        assert_ne!(new_instancer, before);
    }

    #[test]
    fn instance_indices_follow_path_order() {
        let input = RetainedSceneIndex::new();
        // Scrambled arrival order; indices must come out sorted by path.
        input.add_prims(vec![
            PrimEntry::new(
                p("/World/C"),
                "instance",
                Some(instance_source("/Proto", "/Looks/steel")),
            ),
            PrimEntry::new(
                p("/World/A"),
                "instance",
                Some(instance_source("/Proto", "/Looks/steel")),
            ),
            PrimEntry::new(
                p("/World/B"),
                "instance",
                Some(instance_source("/Proto", "/Looks/steel")),
            ),
        ]);
        let index = InstanceAggregationSceneIndex::new(input);

        assert_eq!(instance_index(&index, "/World/A"), 0);
        assert_eq!(instance_index(&index, "/World/B"), 1);
        assert_eq!(instance_index(&index, "/World/C"), 2);

        let indices = value_at_locator(
            index.prim(&sole_instancer(&index)).data_source.as_ref(),
            &Locator::from_names(["instancerTopology", "instanceIndices"]),
        );
        assert_eq!(indices, Some(Value::IntVec(vec![0, 1, 2])));
    }

    #[test]
    fn membership_change_dirties_handed_out_indices() {
        use parking_lot::Mutex as PMutex;

        #[derive(Default)]
        struct Recorder {
            dirtied: PMutex<Vec<DirtiedEntry>>,
            removed: PMutex<Vec<RemovedEntry>>,
        }
        impl SceneIndexObserver for Recorder {
            fn prims_added(&self, _: &dyn SceneIndex, _: &[AddedEntry]) {}
            fn prims_removed(&self, _: &dyn SceneIndex, entries: &[RemovedEntry]) {
                self.removed.lock().extend(entries.iter().cloned());
            }
            fn prims_dirtied(&self, _: &dyn SceneIndex, entries: &[DirtiedEntry]) {
                self.dirtied.lock().extend(entries.iter().cloned());
            }
            fn prims_renamed(&self, _: &dyn SceneIndex, _: &[RenamedEntry]) {}
        }

        let input = populated_input();
        let index = InstanceAggregationSceneIndex::new(input.clone());
        // Pull one index so the cache is live.
        assert_eq!(instance_index(&index, "/World/Cube1"), 0);

        let recorder = Arc::new(Recorder::default());
        let observer: SceneIndexObserverRef = recorder.clone();
        index.state().add_observer(&observer);

        input.remove_prims(vec![RemovedEntry::new(p("/World/Cube2"))]);

        {
            let removed = recorder.removed.lock();
            assert!(removed.iter().any(|e| e.path == p("/World/Cube2")));
            let dirtied = recorder.dirtied.lock();
            assert!(dirtied
                .iter()
                .any(|e| e.path == p("/World/Cube1")
                    && e.locators.intersects(&Locator::from_names(["instance"]))));
        }

        // Re-adding a member re-indexes against current membership.
        input.add_prims(vec![PrimEntry::new(
            p("/World/Cube0"),
            "instance",
            Some(instance_source("/Proto", "/Looks/steel")),
        )]);
        assert_eq!(instance_index(&index, "/World/Cube0"), 0);
        assert_eq!(instance_index(&index, "/World/Cube1"), 1);
    }

    #[test]
    fn transform_edit_dirties_instancer_primvars() {
        use parking_lot::Mutex as PMutex;

        #[derive(Default)]
        struct Dirties(PMutex<Vec<DirtiedEntry>>);
        impl SceneIndexObserver for Dirties {
            fn prims_added(&self, _: &dyn SceneIndex, _: &[AddedEntry]) {}
            fn prims_removed(&self, _: &dyn SceneIndex, _: &[RemovedEntry]) {}
            fn prims_dirtied(&self, _: &dyn SceneIndex, entries: &[DirtiedEntry]) {
                self.0.lock().extend(entries.iter().cloned());
            }
            fn prims_renamed(&self, _: &dyn SceneIndex, _: &[RenamedEntry]) {}
        }

        let input = populated_input();
        let index = InstanceAggregationSceneIndex::new(input.clone());
        let instancer = sole_instancer(&index);

        let recorder = Arc::new(Dirties::default());
        let observer: SceneIndexObserverRef = recorder.clone();
        index.state().add_observer(&observer);

        input.dirty_prims(vec![DirtiedEntry::new(
            p("/World/Cube1"),
            LocatorSet::from_locators([Locator::from_names(["xform", "matrix"])]),
        )]);

        let dirtied = recorder.0.lock();
        assert!(dirtied.iter().any(|e| e.path == instancer
            && e.locators
                .intersects(&Locator::from_names(["primvars", "instanceTransform"]))));
    }

    #[test]
    fn last_instance_removal_unwinds_the_hierarchy() {
        let input = populated_input();
        let index = InstanceAggregationSceneIndex::new(input.clone());
        assert_eq!(hash_scopes(&index).len(), 1);

        input.remove_prims(vec![RemovedEntry::new(p("/World"))]);

        assert!(hash_scopes(&index).is_empty());
        assert!(index.prim(&p("/World/Cube1")).is_placeholder());
    }
}
