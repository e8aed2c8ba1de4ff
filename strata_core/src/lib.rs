// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Core: the scene-index contract, observer protocol, and retained store.
//!
//! A *scene index* is a node in a composition graph over a tree-shaped path
//! space. It answers two pull-style queries — [`SceneIndex::prim`] and
//! [`SceneIndex::child_prim_paths`] — and pushes four kinds of invalidation
//! notices to registered [`SceneIndexObserver`]s: added, removed, dirtied, and
//! renamed. The pull plane computes prim state on demand; the push plane keeps
//! downstream layers consistent under fine-grained edits. The two planes must
//! agree at all times.
//!
//! This crate provides:
//!
//! - The [`SceneIndex`] trait and its shared per-node state
//!   ([`SceneIndexState`]): observer registry with reentrancy-safe dispatch,
//!   debug display name, and classification tags.
//! - The [`SceneIndexObserver`] trait and notice entry types, plus the default
//!   reduction of a rename into remove + add
//!   ([`convert_renamed_to_removed_and_added`]).
//! - [`PrimView`]: lazy, depth-first, prunable traversal.
//! - [`RetainedSceneIndex`]: a concrete, mutable, ordered in-memory store —
//!   the leaf "source of truth" node in most graphs.
//! - A process-wide, weakly-held [name registry](register_named_scene_index)
//!   for diagnostic tooling.
//!
//! ## Ownership discipline
//!
//! Downstream nodes hold *strong* references to their upstream inputs;
//! observer registrations are *weak*. This keeps the graph acyclic in
//! ownership terms: destroying a downstream node implicitly ends its
//! registrations (dead weak observers are skipped and swept during dispatch).
//!
//! ## Error posture
//!
//! Queries are total functions. Absence is a value — the placeholder prim
//! (empty type, no data source) — never an error. Usage errors (double
//! observer registration and the like) are reported through `log` and then
//! degraded gracefully; nothing in this crate panics in non-test code.

mod empty;
mod index;
mod notices;
mod observer;
mod prim;
mod prim_view;
mod registry;
mod retained;

pub use empty::EmptySceneIndex;
pub use index::{SceneIndex, SceneIndexRef, SceneIndexState};
pub use notices::{AddedEntry, DirtiedEntry, RemovedEntry, RenamedEntry};
pub use observer::{convert_renamed_to_removed_and_added, SceneIndexObserver, SceneIndexObserverRef};
pub use prim::Prim;
pub use prim_view::PrimView;
pub use registry::{named_scene_index, named_scene_index_names, register_named_scene_index};
pub use retained::{PrimEntry, RetainedSceneIndex};
