// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Null-safe accessor helpers.
//!
//! Every accessor propagates absence as `None`; walking a locator through a
//! tree stops at the first missing child.

use strata_path::{Locator, Token};

use crate::source::DataSourceRef;
use crate::value::Value;

/// The named child of a container source, or `None` if the source is absent,
/// not a container, or has no such child.
#[must_use]
pub fn container_get(source: Option<&DataSourceRef>, name: &Token) -> Option<DataSourceRef> {
    source?.as_container()?.get(name)
}

/// Walks a locator through nested containers.
///
/// The empty locator returns the source itself.
#[must_use]
pub fn locator_get(source: Option<&DataSourceRef>, locator: &Locator) -> Option<DataSourceRef> {
    let mut current = source?.clone();
    for name in locator.parts() {
        current = current.as_container()?.get(name)?;
    }
    Some(current)
}

/// The value of a sampled source at shutter offset 0.
#[must_use]
pub fn sampled_value(source: Option<&DataSourceRef>) -> Option<Value> {
    Some(source?.as_sampled()?.value(0.0))
}

/// The value at a locator, at shutter offset 0.
#[must_use]
pub fn value_at_locator(source: Option<&DataSourceRef>, locator: &Locator) -> Option<Value> {
    let leaf = locator_get(source, locator)?;
    Some(leaf.as_sampled()?.value(0.0))
}
