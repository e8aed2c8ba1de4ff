// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The data-source trait family.

use std::sync::Arc;

use strata_path::Token;

use crate::value::Value;

/// A shared handle to a data source.
pub type DataSourceRef = Arc<dyn DataSource>;

/// A node in a prim's lazy key → value tree.
///
/// Capabilities are discovered by query rather than downcast: a container
/// answers [`as_container`](Self::as_container), a sampled leaf answers
/// [`as_sampled`](Self::as_sampled). A source may answer both, although none
/// of the built-in sources do.
pub trait DataSource: Send + Sync {
    /// This source viewed as a container, if it is one.
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        None
    }

    /// This source viewed as a sampled leaf, if it is one.
    fn as_sampled(&self) -> Option<&dyn SampledDataSource> {
        None
    }
}

/// An associative data source: named children, fetched lazily.
///
/// `get` may recompute its answer on every call; callers must not rely on
/// object identity between calls.
pub trait ContainerDataSource: DataSource {
    /// The child with the given name, or `None` if absent.
    fn get(&self, name: &Token) -> Option<DataSourceRef>;

    /// The names of all children.
    fn names(&self) -> Vec<Token>;
}

/// A leaf data source with a (possibly time-varying) value.
pub trait SampledDataSource: DataSource {
    /// The value at the given shutter offset.
    fn value(&self, shutter_offset: f64) -> Value;

    /// Sample times contributing to the given shutter interval.
    ///
    /// An empty result means the value is constant over the interval; the
    /// default implementation reports constant.
    fn sample_times_in_interval(&self, start: f64, end: f64) -> Vec<f64> {
        let _ = (start, end);
        Vec::new()
    }
}
