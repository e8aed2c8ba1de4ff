// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Data: lazy, typed data-source trees for scene-index prims.
//!
//! A prim's attributes are an opaque key → value tree. The tree is *lazy*:
//! a [`ContainerDataSource`] may compute each child on every
//! [`get`](ContainerDataSource::get) call, and callers must not assume that
//! two calls return the same object. References are shared
//! ([`DataSourceRef`] is an `Arc`), so copies of a tree share structure.
//!
//! Capability queries replace downcasting: every [`DataSource`] answers
//! [`as_container`](DataSource::as_container) and
//! [`as_sampled`](DataSource::as_sampled), returning `None` for capabilities
//! it lacks. "Not present" is universally `None`, never an error.
//!
//! The crate also provides the retained (eagerly stored, immutable)
//! constructors used when synthesizing derived data — [`RetainedContainer`]
//! and [`RetainedValue`] — and the strength-ordered [`OverlayContainer`] used
//! for composing data sources from multiple inputs.

mod access;
mod overlay;
mod retained;
mod source;
mod value;

pub use access::{container_get, locator_get, sampled_value, value_at_locator};
pub use overlay::OverlayContainer;
pub use retained::{ContainerBuilder, RetainedContainer, RetainedValue};
pub use source::{ContainerDataSource, DataSource, DataSourceRef, SampledDataSource};
pub use value::Value;
