// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide, weakly-held scene-index name registry.
//!
//! Diagnostic tooling can look up a scene index by a string name without
//! keeping it alive: entries hold weak references and are pruned lazily —
//! every lookup or enumeration first clears entries whose referent has
//! expired. Registering an existing name overwrites it (last writer wins).

use std::collections::BTreeMap;
use std::sync::Weak;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::index::{SceneIndex, SceneIndexRef};

static REGISTRY: Lazy<Mutex<BTreeMap<String, Weak<dyn SceneIndex>>>> =
    Lazy::new(|| Mutex::new(BTreeMap::new()));

/// Registers a scene index under a name, weakly held.
pub fn register_named_scene_index(name: impl Into<String>, index: &SceneIndexRef) {
    REGISTRY
        .lock()
        .insert(name.into(), std::sync::Arc::downgrade(index));
}

/// Looks up a registered scene index, pruning expired entries first.
#[must_use]
pub fn named_scene_index(name: &str) -> Option<SceneIndexRef> {
    let mut registry = REGISTRY.lock();
    registry.retain(|_, weak| weak.strong_count() > 0);
    registry.get(name).and_then(Weak::upgrade)
}

/// The names of all live registered scene indices, pruned of expired entries.
#[must_use]
pub fn named_scene_index_names() -> Vec<String> {
    let mut registry = REGISTRY.lock();
    registry.retain(|_, weak| weak.strong_count() > 0);
    registry.keys().cloned().collect()
}
