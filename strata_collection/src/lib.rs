// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Collection: membership expressions over scene indices.
//!
//! A collection expression is a compiled path pattern (literal segments,
//! `*` globs, `//` recursive descent) with an optional named predicate
//! clause such as `{type:mesh}`. Bound to a scene index and a
//! [`PredicateLibrary`], a [`CollectionExpressionEvaluator`] answers both
//! "does this path match?" and "which paths under this root match?", with
//! subtree short-circuiting wherever the outcome is known to be constant
//! across descendants.

mod evaluator;
mod pattern;
mod predicate;

pub use evaluator::{CollectionExpressionEvaluator, MatchKind, MatchResult};
pub use pattern::{PathPattern, PatternParseError, PredicateCall};
pub use predicate::{scene_predicate_library, PredicateFn, PredicateLibrary, PredicateResult};
