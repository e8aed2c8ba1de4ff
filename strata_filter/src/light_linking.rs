// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Light linking: collection membership turned into category tokens.

use core::fmt;
use std::collections::BTreeSet;
use std::sync::Arc;

use hashbrown::HashMap;
use log::error;
use parking_lot::Mutex;
use strata_collection::{
    scene_predicate_library, CollectionExpressionEvaluator, PathPattern, PredicateLibrary,
};
use strata_core::{
    AddedEntry, DirtiedEntry, Prim, RemovedEntry, RenamedEntry, SceneIndex, SceneIndexObserver,
    SceneIndexObserverRef, SceneIndexRef, SceneIndexState,
};
use strata_data::{
    value_at_locator, ContainerDataSource, DataSource, DataSourceRef, RetainedValue, Value,
};
use strata_path::{Locator, LocatorSet, ScenePath, Token};

use crate::single_input::SingleInputBase;

const LIGHT_LINK: &str = "lightLink";
const SHADOW_LINK: &str = "shadowLink";
const FILTER_LINK: &str = "filterLink";

fn linking_collection_names() -> [Token; 3] {
    [
        Token::new(LIGHT_LINK),
        Token::new(SHADOW_LINK),
        Token::new(FILTER_LINK),
    ]
}

fn collection_locator(name: &Token) -> Locator {
    Locator::from_names(["collections"]).append(name.clone())
}

/// A linking collection's identity: the owning prim plus the collection
/// name on it.
type CollectionId = (ScenePath, Token);

/// Tracks the correspondence between linking collections, their membership
/// expressions, and the category token assigned to each distinct
/// expression.
///
/// Collections sharing one expression share one category. Trivial
/// expressions (`//`, targeting everything) are deliberately untracked;
/// they read back as the empty category token.
struct LinkCache {
    input: SceneIndexRef,
    library: PredicateLibrary,
    expr_to_entry: HashMap<String, (Token, Arc<CollectionExpressionEvaluator>)>,
    category_to_expr: HashMap<Token, String>,
    collection_to_category: HashMap<CollectionId, Token>,
    category_to_collections: HashMap<Token, BTreeSet<CollectionId>>,
    next_category: u64,
    // Invalidation queued up while processing one upstream notice.
    dirty_exprs: Vec<String>,
    dirty_collections: Vec<CollectionId>,
}

impl LinkCache {
    fn new(input: SceneIndexRef) -> Self {
        Self {
            input,
            library: scene_predicate_library(),
            expr_to_entry: HashMap::new(),
            category_to_expr: HashMap::new(),
            collection_to_category: HashMap::new(),
            category_to_collections: HashMap::new(),
            next_category: 0,
            dirty_exprs: Vec::new(),
            dirty_collections: Vec::new(),
        }
    }

    fn new_category(&mut self) -> Token {
        let category = Token::new(format!("linkCategory{}", self.next_category));
        self.next_category = self.next_category.wrapping_add(1);
        // The number of distinct expressions should be in the hundreds,
        // nowhere near 2^64.
        if self.next_category == 0 {
            error!("category counter overflow while assigning link categories");
        }
        category
    }

    /// Updates the tables for one collection given its current expression
    /// (`None` when absent). Queues invalidation for whatever changed.
    fn process_collection(
        &mut self,
        prim_path: &ScenePath,
        collection_name: &Token,
        expression: Option<&str>,
    ) {
        let collection_id = (prim_path.clone(), collection_name.clone());
        if let Some(category) = self.collection_to_category.get(&collection_id).cloned() {
            let old_expr = match self.category_to_expr.get(&category) {
                Some(expr) => expr.clone(),
                None => {
                    error!("link category {category} has no recorded expression");
                    return;
                }
            };
            if Some(old_expr.as_str()) == expression {
                return;
            }
            // Expression changed; drop the old association and invalidate
            // both its targets and the owning light.
            self.remove_collection_entry(&collection_id, true);
            self.dirty_exprs.push(old_expr);
        }

        let Some(expression) = expression else {
            return;
        };
        let pattern: PathPattern = match expression.parse() {
            Ok(pattern) => pattern,
            Err(parse_error) => {
                error!("ignoring link collection on {prim_path}: {parse_error}");
                return;
            }
        };
        if pattern.is_trivial() {
            // Everything is targeted; trivial collections are represented
            // by the absence of a cache entry.
            return;
        }

        let category = match self.expr_to_entry.get(expression) {
            Some((category, _)) => category.clone(),
            None => {
                let category = self.new_category();
                let evaluator = Arc::new(CollectionExpressionEvaluator::new(
                    self.input.clone(),
                    pattern,
                    self.library.clone(),
                ));
                self.expr_to_entry
                    .insert(expression.to_owned(), (category.clone(), evaluator));
                self.category_to_expr
                    .insert(category.clone(), expression.to_owned());
                category
            }
        };
        self.collection_to_category
            .insert(collection_id.clone(), category.clone());
        self.category_to_collections
            .entry(category)
            .or_default()
            .insert(collection_id);
        self.dirty_exprs.push(expression.to_owned());
    }

    fn remove_collection(&mut self, prim_path: &ScenePath, collection_name: &Token) {
        self.remove_collection_entry(&(prim_path.clone(), collection_name.clone()), false);
    }

    fn remove_collection_entry(&mut self, collection_id: &CollectionId, dirty_collection: bool) {
        let Some(category) = self.collection_to_category.remove(collection_id) else {
            return;
        };
        let Some(collections) = self.category_to_collections.get_mut(&category) else {
            error!("link category {category} has no recorded collections");
            return;
        };
        collections.remove(collection_id);
        let orphaned = collections.is_empty();
        if orphaned {
            // Last collection using this category; retire it and its
            // expression entry.
            self.category_to_collections.remove(&category);
            if let Some(expression) = self.category_to_expr.remove(&category) {
                self.expr_to_entry.remove(&expression);
                self.dirty_exprs.push(expression);
            }
        } else if let Some(expression) = self.category_to_expr.get(&category) {
            self.dirty_exprs.push(expression.clone());
        }
        if dirty_collection {
            self.dirty_collections.push(collection_id.clone());
        }
    }

    /// The categories whose expressions include `prim_path`.
    fn categories_for(&self, prim_path: &ScenePath) -> Vec<Token> {
        // The number of distinct expressions is expected to be small
        // enough that evaluating each per query is acceptable.
        let mut categories: Vec<Token> = self
            .expr_to_entry
            .values()
            .filter(|(_, evaluator)| evaluator.matches(prim_path).matched)
            .map(|(category, _)| category.clone())
            .collect();
        categories.sort();
        categories
    }

    fn category_for_collection(
        &self,
        prim_path: &ScenePath,
        collection_name: &Token,
    ) -> Option<Token> {
        self.collection_to_category
            .get(&(prim_path.clone(), collection_name.clone()))
            .cloned()
    }

    /// Turns the queued dirty state into notice entries: the targets of
    /// every touched expression get their categories invalidated, and the
    /// owning prim of every touched collection gets its link locator
    /// invalidated.
    fn drain_invalidation(&mut self, dirtied: &mut Vec<DirtiedEntry>) {
        let mut exprs: Vec<String> = core::mem::take(&mut self.dirty_exprs);
        exprs.sort();
        exprs.dedup();
        let categories_locators = LocatorSet::from_locators([Locator::from_names(["categories"])]);
        for expression in exprs {
            // The entry may be gone when the expression was retired; its
            // former targets still need invalidation, so re-evaluate.
            let evaluator = match self.expr_to_entry.get(&expression) {
                Some((_, evaluator)) => evaluator.clone(),
                None => match expression.parse::<PathPattern>() {
                    Ok(pattern) => Arc::new(CollectionExpressionEvaluator::new(
                        self.input.clone(),
                        pattern,
                        self.library.clone(),
                    )),
                    Err(_) => continue,
                },
            };
            for target in evaluator.populate_all_matches(&ScenePath::root()) {
                dirtied.push(DirtiedEntry::new(target, categories_locators.clone()));
            }
        }
        let light_locators = LocatorSet::from_locators([Locator::from_names(["light"])]);
        for (prim_path, _) in core::mem::take(&mut self.dirty_collections) {
            dirtied.push(DirtiedEntry::new(prim_path, light_locators.clone()));
        }
    }
}

/// Reads linking collections off light and light filter prims, assigns a
/// category token per distinct membership expression, and rewrites prims
/// on the way through: lights gain the category token for each of their
/// collections under the `light` container, and geometry gains a
/// `categories` list naming every category whose expression includes it.
///
/// Collections live on light prims under
/// `collections.<name>.membershipExpression` for the names `lightLink`,
/// `shadowLink` (lights), and `filterLink` (light filters). Invalidation
/// is narrow: editing one collection's expression re-dirties only that
/// expression's targets and the owning light.
pub struct LightLinkingSceneIndex {
    base: SingleInputBase,
    cache: Arc<Mutex<LinkCache>>,
    light_types: Vec<Token>,
    light_filter_types: Vec<Token>,
    geometry_types: Vec<Token>,
    tracked_lights: Mutex<BTreeSet<ScenePath>>,
}

impl LightLinkingSceneIndex {
    /// Creates a light linking index over `input` with stock prim-type
    /// classifications.
    #[must_use]
    pub fn new(input: SceneIndexRef) -> Arc<Self> {
        Self::with_prim_types(
            input,
            vec![Token::new("light"), Token::new("domeLight")],
            vec![Token::new("lightFilter")],
            vec![
                Token::new("mesh"),
                Token::new("basisCurves"),
                Token::new("points"),
                Token::new("volume"),
            ],
        )
    }

    /// Creates a light linking index with explicit prim-type sets for
    /// lights, light filters, and geometry.
    #[must_use]
    pub fn with_prim_types(
        input: SceneIndexRef,
        light_types: Vec<Token>,
        light_filter_types: Vec<Token>,
        geometry_types: Vec<Token>,
    ) -> Arc<Self> {
        let cache = Arc::new(Mutex::new(LinkCache::new(input.clone())));
        let this = Arc::new(Self {
            base: SingleInputBase::new("LightLinkingSceneIndex", Some(input)),
            cache,
            light_types,
            light_filter_types,
            geometry_types,
            tracked_lights: Mutex::new(BTreeSet::new()),
        });
        let observer: SceneIndexObserverRef = this.clone();
        this.base.input().state().add_observer(&observer);
        this
    }

    fn is_light(&self, prim_type: &Token) -> bool {
        self.light_types.contains(prim_type)
    }

    fn is_light_filter(&self, prim_type: &Token) -> bool {
        self.light_filter_types.contains(prim_type)
    }

    fn is_geometry(&self, prim_type: &Token) -> bool {
        self.geometry_types.contains(prim_type)
    }

    fn collection_names_for(&self, prim_type: &Token) -> &'static [&'static str] {
        if self.is_light(prim_type) {
            &[LIGHT_LINK, SHADOW_LINK]
        } else {
            &[FILTER_LINK]
        }
    }

    /// Reads the current membership expressions off a light prim and
    /// updates the cache for each of its linking collections.
    fn refresh_collections(&self, path: &ScenePath, prim: &Prim, names: &[&str]) {
        let mut cache = self.cache.lock();
        for name in names {
            let name = Token::new(*name);
            let expression = value_at_locator(
                prim.data_source.as_ref(),
                &collection_locator(&name).append("membershipExpression"),
            );
            match expression {
                Some(Value::String(text)) => {
                    cache.process_collection(path, &name, Some(text.as_str()));
                }
                _ => cache.process_collection(path, &name, None),
            }
        }
    }

    fn drop_all_collections(&self, path: &ScenePath) {
        let mut cache = self.cache.lock();
        for name in linking_collection_names() {
            cache.remove_collection(path, &name);
        }
    }
}

impl SceneIndex for LightLinkingSceneIndex {
    fn prim(&self, path: &ScenePath) -> Prim {
        let mut prim = self.base.input().prim(path);
        if let Some(source) = prim.data_source.take() {
            prim.data_source = Some(if self.is_geometry(&prim.prim_type) {
                Arc::new(GeometryCategoriesSource {
                    inner: source,
                    path: path.clone(),
                    cache: self.cache.clone(),
                })
            } else if self.is_light(&prim.prim_type) || self.is_light_filter(&prim.prim_type) {
                Arc::new(LightPrimSource {
                    inner: source,
                    path: path.clone(),
                    cache: self.cache.clone(),
                })
            } else {
                source
            });
        }
        prim
    }

    fn child_prim_paths(&self, path: &ScenePath) -> Vec<ScenePath> {
        // Topology is untouched.
        self.base.input().child_prim_paths(path)
    }

    fn state(&self) -> &SceneIndexState {
        self.base.state()
    }
}

impl SceneIndexObserver for LightLinkingSceneIndex {
    fn prims_added(&self, _sender: &dyn SceneIndex, entries: &[AddedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let mut dirtied = Vec::new();
        for entry in entries {
            if self.is_light(&entry.prim_type) || self.is_light_filter(&entry.prim_type) {
                self.tracked_lights.lock().insert(entry.path.clone());
                let prim = self.base.input().prim(&entry.path);
                self.refresh_collections(
                    &entry.path,
                    &prim,
                    self.collection_names_for(&entry.prim_type),
                );
            } else if self.tracked_lights.lock().remove(&entry.path) {
                // Re-added as something that is no longer a light.
                self.drop_all_collections(&entry.path);
            }
        }
        self.cache.lock().drain_invalidation(&mut dirtied);
        self.base.state().send_prims_added(self, entries);
        self.base.state().send_prims_dirtied(self, &dirtied);
    }

    fn prims_removed(&self, _sender: &dyn SceneIndex, entries: &[RemovedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let mut dirtied = Vec::new();
        for entry in entries {
            // Removal is subtree-transitive; every tracked light under the
            // removed path goes with it.
            let doomed: Vec<ScenePath> = self
                .tracked_lights
                .lock()
                .iter()
                .filter(|tracked| tracked.has_prefix(&entry.path))
                .cloned()
                .collect();
            for light_path in doomed {
                self.drop_all_collections(&light_path);
                self.tracked_lights.lock().remove(&light_path);
            }
        }
        self.cache.lock().drain_invalidation(&mut dirtied);
        self.base.state().send_prims_removed(self, entries);
        self.base.state().send_prims_dirtied(self, &dirtied);
    }

    fn prims_dirtied(&self, _sender: &dyn SceneIndex, entries: &[DirtiedEntry]) {
        if !self.base.is_observed() {
            return;
        }
        let mut extra = Vec::new();
        for entry in entries {
            if !self.tracked_lights.lock().contains(&entry.path) {
                continue;
            }
            let touched: Vec<Token> = linking_collection_names()
                .into_iter()
                .filter(|name| entry.locators.intersects(&collection_locator(name)))
                .collect();
            if touched.is_empty() {
                continue;
            }
            let prim = self.base.input().prim(&entry.path);
            let names: Vec<&str> = touched.iter().map(Token::as_str).collect();
            self.refresh_collections(&entry.path, &prim, &names);
        }
        self.cache.lock().drain_invalidation(&mut extra);
        self.base.state().send_prims_dirtied(self, entries);
        self.base.state().send_prims_dirtied(self, &extra);
    }

    fn prims_renamed(&self, sender: &dyn SceneIndex, entries: &[RenamedEntry]) {
        let mut removed = Vec::new();
        let mut added = Vec::new();
        strata_core::convert_renamed_to_removed_and_added(sender, entries, &mut removed, &mut added);
        self.prims_removed(sender, &removed);
        self.prims_added(sender, &added);
    }
}

impl fmt::Debug for LightLinkingSceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightLinkingSceneIndex")
            .field("tracked_lights", &self.tracked_lights.lock().len())
            .finish()
    }
}

/// Adds a `categories` list to a geometry prim's data source.
struct GeometryCategoriesSource {
    inner: DataSourceRef,
    path: ScenePath,
    cache: Arc<Mutex<LinkCache>>,
}

impl DataSource for GeometryCategoriesSource {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        Some(self)
    }
}

impl ContainerDataSource for GeometryCategoriesSource {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        if name == &Token::new("categories") {
            let categories = self.cache.lock().categories_for(&self.path);
            if categories.is_empty() {
                return None;
            }
            return Some(RetainedValue::new(Value::TokenVec(categories)));
        }
        self.inner.as_container()?.get(name)
    }

    fn names(&self) -> Vec<Token> {
        let mut names = self
            .inner
            .as_container()
            .map(|container| container.names())
            .unwrap_or_default();
        let categories = Token::new("categories");
        if !names.contains(&categories) {
            names.push(categories);
        }
        names
    }
}

/// Overrides a light prim's `light` container with the category token for
/// each of its linking collections.
struct LightPrimSource {
    inner: DataSourceRef,
    path: ScenePath,
    cache: Arc<Mutex<LinkCache>>,
}

impl DataSource for LightPrimSource {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        Some(self)
    }
}

impl ContainerDataSource for LightPrimSource {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        let inherited = self.inner.as_container()?.get(name);
        if name == &Token::new("light") {
            return Some(Arc::new(LightLinkSource {
                prim_container: self.inner.clone(),
                light: inherited,
                path: self.path.clone(),
                cache: self.cache.clone(),
            }));
        }
        inherited
    }

    fn names(&self) -> Vec<Token> {
        let mut names = self
            .inner
            .as_container()
            .map(|container| container.names())
            .unwrap_or_default();
        let light = Token::new("light");
        if !names.contains(&light) {
            names.push(light);
        }
        names
    }
}

/// The `light` container itself: link names resolve to category tokens.
struct LightLinkSource {
    prim_container: DataSourceRef,
    light: Option<DataSourceRef>,
    path: ScenePath,
    cache: Arc<Mutex<LinkCache>>,
}

impl LightLinkSource {
    fn collection_name_for(link_name: &Token) -> Option<Token> {
        match link_name.as_str() {
            LIGHT_LINK | SHADOW_LINK => Some(link_name.clone()),
            // The schema key differs from the collection's instance name.
            "lightFilterLink" => Some(Token::new(FILTER_LINK)),
            _ => None,
        }
    }

    fn has_collection(&self, collection_name: &Token) -> bool {
        strata_data::locator_get(
            Some(&self.prim_container),
            &collection_locator(collection_name),
        )
        .is_some()
    }
}

impl DataSource for LightLinkSource {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        Some(self)
    }
}

impl ContainerDataSource for LightLinkSource {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        if let Some(collection_name) = Self::collection_name_for(name) {
            if self.has_collection(&collection_name) {
                let category = self
                    .cache
                    .lock()
                    .category_for_collection(&self.path, &collection_name)
                    // Trivial collections read back as the empty token.
                    .unwrap_or_default();
                return Some(RetainedValue::new(Value::Token(category)));
            }
        }
        self.light.as_ref()?.as_container()?.get(name)
    }

    fn names(&self) -> Vec<Token> {
        let mut names = self
            .light
            .as_ref()
            .and_then(|light| light.as_container())
            .map(|container| container.names())
            .unwrap_or_default();
        for name in [LIGHT_LINK, SHADOW_LINK, "lightFilterLink"] {
            let name = Token::new(name);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{p, Recorder};
    use strata_core::{PrimEntry, RetainedSceneIndex};
    use strata_data::RetainedContainer;

    fn light_entry(path: &str, expression: &str) -> PrimEntry {
        PrimEntry::new(
            p(path),
            "light",
            Some(
                RetainedContainer::builder()
                    .set(
                        "collections",
                        RetainedContainer::builder()
                            .set(
                                LIGHT_LINK,
                                RetainedContainer::builder()
                                    .set(
                                        "membershipExpression",
                                        RetainedValue::new(Value::String(expression.to_owned())),
                                    )
                                    .build(),
                            )
                            .build(),
                    )
                    .build(),
            ),
        )
    }

    fn categories_of(index: &dyn SceneIndex, path: &ScenePath) -> Vec<Token> {
        value_at_locator(
            index.prim(path).data_source.as_ref(),
            &Locator::from_names(["categories"]),
        )
        .and_then(|value| value.as_tokens().map(<[Token]>::to_vec))
        .unwrap_or_default()
    }

    fn link_category(index: &dyn SceneIndex, path: &ScenePath) -> Option<Value> {
        value_at_locator(
            index.prim(path).data_source.as_ref(),
            &Locator::from_names(["light", LIGHT_LINK]),
        )
    }

    #[test]
    fn linked_geometry_gains_categories() {
        let scene = RetainedSceneIndex::new();
        let linking = LightLinkingSceneIndex::new(scene.clone());
        let (_recorder, _keep) = Recorder::attach(&*linking);

        scene.add_prims(vec![
            PrimEntry::typed(p("/geo"), "scope"),
            PrimEntry::typed(p("/geo/included"), "mesh"),
            PrimEntry::typed(p("/geo/excluded"), "mesh"),
            light_entry("/lights/key", "/geo/included"),
        ]);

        let categories = categories_of(&*linking, &p("/geo/included"));
        assert_eq!(categories.len(), 1);
        assert!(categories_of(&*linking, &p("/geo/excluded")).is_empty());

        // The light's link reads back the same category token.
        assert_eq!(
            link_category(&*linking, &p("/lights/key")),
            Some(Value::Token(categories[0].clone()))
        );
    }

    #[test]
    fn shared_expression_shares_category() {
        let scene = RetainedSceneIndex::new();
        let linking = LightLinkingSceneIndex::new(scene.clone());
        let (_recorder, _keep) = Recorder::attach(&*linking);

        scene.add_prims(vec![
            PrimEntry::typed(p("/geo/a"), "mesh"),
            light_entry("/lights/one", "/geo//"),
            light_entry("/lights/two", "/geo//"),
        ]);

        assert_eq!(
            link_category(&*linking, &p("/lights/one")),
            link_category(&*linking, &p("/lights/two"))
        );
        assert_eq!(categories_of(&*linking, &p("/geo/a")).len(), 1);
    }

    #[test]
    fn trivial_collection_reads_empty_category() {
        let scene = RetainedSceneIndex::new();
        let linking = LightLinkingSceneIndex::new(scene.clone());
        let (_recorder, _keep) = Recorder::attach(&*linking);

        scene.add_prims(vec![
            PrimEntry::typed(p("/geo/a"), "mesh"),
            light_entry("/lights/everything", "//"),
        ]);

        assert_eq!(
            link_category(&*linking, &p("/lights/everything")),
            Some(Value::Token(Token::default()))
        );
        // Nothing tracked means no categories injected anywhere.
        assert!(categories_of(&*linking, &p("/geo/a")).is_empty());
    }

    #[test]
    fn expression_edit_invalidates_targets_and_light() {
        let scene = RetainedSceneIndex::new();
        let linking = LightLinkingSceneIndex::new(scene.clone());
        let (recorder, _keep) = Recorder::attach(&*linking);

        scene.add_prims(vec![
            PrimEntry::typed(p("/geo/a"), "mesh"),
            PrimEntry::typed(p("/geo/b"), "mesh"),
            light_entry("/lights/key", "/geo/a"),
        ]);
        let before = link_category(&*linking, &p("/lights/key"));
        recorder.clear();

        // Swap the membership expression and signal the collection edit.
        scene.add_prims(vec![light_entry("/lights/key", "/geo/b")]);
        let dirtied = recorder.dirtied_paths();
        // Old and new targets both re-fetch categories; the light itself
        // re-fetches its link category.
        assert!(dirtied.contains(&p("/geo/a")));
        assert!(dirtied.contains(&p("/geo/b")));
        assert!(dirtied.contains(&p("/lights/key")));

        assert!(categories_of(&*linking, &p("/geo/a")).is_empty());
        assert_eq!(categories_of(&*linking, &p("/geo/b")).len(), 1);
        assert_ne!(link_category(&*linking, &p("/lights/key")), before);
    }

    #[test]
    fn removed_light_releases_targets() {
        let scene = RetainedSceneIndex::new();
        let linking = LightLinkingSceneIndex::new(scene.clone());
        let (recorder, _keep) = Recorder::attach(&*linking);

        scene.add_prims(vec![
            PrimEntry::typed(p("/geo/a"), "mesh"),
            light_entry("/lights/key", "/geo/a"),
        ]);
        assert_eq!(categories_of(&*linking, &p("/geo/a")).len(), 1);
        recorder.clear();

        scene.remove_prims(vec![RemovedEntry::new(p("/lights"))]);
        assert!(recorder.dirtied_paths().contains(&p("/geo/a")));
        assert!(categories_of(&*linking, &p("/geo/a")).is_empty());
    }
}

