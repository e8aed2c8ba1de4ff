// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Notification entry types.
//!
//! Notices are plain values, batched into slices for delivery. An added entry
//! carries only the path and type — the data source is fetched on demand via
//! [`SceneIndex::prim`](crate::SceneIndex::prim), never shipped in a notice.
//! A removed entry stands for the whole subtree at its path; descendants are
//! implied, not enumerated.

use strata_path::{LocatorSet, ScenePath, Token};

/// A prim (newly or still) exists at a path, with the given type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddedEntry {
    /// The prim's path.
    pub path: ScenePath,
    /// The prim's type; may be empty for placeholders.
    pub prim_type: Token,
}

impl AddedEntry {
    /// Creates an added entry.
    #[must_use]
    pub fn new(path: ScenePath, prim_type: impl Into<Token>) -> Self {
        Self {
            path,
            prim_type: prim_type.into(),
        }
    }
}

/// The subtree rooted at a path no longer exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedEntry {
    /// Root of the removed subtree.
    pub path: ScenePath,
}

impl RemovedEntry {
    /// Creates a removed entry.
    #[must_use]
    pub fn new(path: ScenePath) -> Self {
        Self { path }
    }
}

/// Specific data-source locations under a path changed value.
///
/// Dirtying signals potential staleness only; it never implies a topology or
/// identity change, and the prim's current value is always re-fetched via the
/// pull plane.
#[derive(Clone, Debug, PartialEq)]
pub struct DirtiedEntry {
    /// The dirtied prim's path.
    pub path: ScenePath,
    /// Which locations within the prim's data source changed.
    pub locators: LocatorSet,
}

impl DirtiedEntry {
    /// Creates a dirtied entry.
    #[must_use]
    pub fn new(path: ScenePath, locators: LocatorSet) -> Self {
        Self { path, locators }
    }
}

/// A subtree moved from one path to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenamedEntry {
    /// The subtree's previous root.
    pub old_path: ScenePath,
    /// The subtree's new root.
    pub new_path: ScenePath,
}

impl RenamedEntry {
    /// Creates a renamed entry.
    #[must_use]
    pub fn new(old_path: ScenePath, new_path: ScenePath) -> Self {
        Self { old_path, new_path }
    }
}
