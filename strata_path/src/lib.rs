// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Path: hierarchical scene paths, tokens, and data-source locators.
//!
//! Every prim in a scene index is identified by a [`ScenePath`]: an immutable,
//! slash-separated, totally-ordered hierarchical key. Paths are the only prim
//! identity in the system; there is no separate numeric id. The total order is
//! segment-lexicographic, which makes a sorted sequence of paths coincide with
//! a depth-first walk of the hierarchy (an ancestor sorts before all of its
//! descendants, and each subtree is a contiguous range).
//!
//! Locations *inside* a prim's data-source tree are identified by a
//! [`Locator`], which has the same shape as a path but names data-source
//! fields rather than prims. Invalidation notices carry a [`LocatorSet`]: a
//! prefix-minimal set of locators with "does this overlap" queries.
//!
//! ```
//! use strata_path::ScenePath;
//!
//! let a: ScenePath = "/world/group/mesh".parse().unwrap();
//! let b: ScenePath = "/world".parse().unwrap();
//! assert!(a.has_prefix(&b));
//! assert_eq!(a.parent().unwrap().to_string(), "/world/group");
//! ```

mod locator;
mod path;
mod token;

pub use locator::{Locator, LocatorSet};
pub use path::{PathParseError, ScenePath};
pub use token::Token;
