// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Filter: composable filtering scene indices.
//!
//! Every type here wraps one or more upstream scene indices and presents a
//! derived scene: queries pull through the upstream(s) with a transform
//! applied, and upstream notices are translated into the filter's own notice
//! vocabulary before being re-emitted. Filters register themselves as weak
//! observers of their inputs; downstream consumers hold the filter strongly.
//!
//! - [`SingleInputBase`]: the shared plumbing for one-upstream filters (input
//!   substitution on misuse, observed-check short-circuit).
//! - [`MergingSceneIndex`]: N inputs composited by positional strength.
//! - [`RerootingSceneIndex`]: presents one subtree under another prefix,
//!   rewriting path-valued data along the way.
//! - [`NoticeBatchingSceneIndex`]: queues notices between explicit begin/end
//!   calls and replays them in arrival order.
//! - [`PruningSceneIndex`] / [`MaterialPruningSceneIndex`]: empty out prims by
//!   type or path while preserving the placeholder-for-children invariant.
//! - [`LightLinkingSceneIndex`]: caches light link collections as category
//!   tokens injected on lights and matched geometry.

mod batching;
mod light_linking;
mod merging;
mod pruning;
mod rerooting;
mod single_input;

#[cfg(test)]
pub(crate) mod test_util;

pub use batching::NoticeBatchingSceneIndex;
pub use light_linking::LightLinkingSceneIndex;
pub use merging::MergingSceneIndex;
pub use pruning::{MaterialPruningSceneIndex, PruningSceneIndex};
pub use rerooting::RerootingSceneIndex;
pub use single_input::SingleInputBase;
