// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained (eagerly stored, immutable) data sources.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_path::Token;

use crate::source::{ContainerDataSource, DataSource, DataSourceRef, SampledDataSource};
use crate::value::Value;

/// An immutable container with eagerly stored children.
///
/// This is the construction helper used whenever the core synthesizes data —
/// placeholder prims, derived instancer attributes, captured binding copies.
/// Children are held in name order.
///
/// ```
/// use strata_data::{RetainedContainer, RetainedValue, Value};
/// use strata_path::Token;
///
/// let ds = RetainedContainer::builder()
///     .set("radius", RetainedValue::new(Value::Float(1.0)))
///     .build();
/// let child = ds.as_container().unwrap().get(&Token::new("radius")).unwrap();
/// assert_eq!(child.as_sampled().unwrap().value(0.0), Value::Float(1.0));
/// ```
pub struct RetainedContainer {
    children: BTreeMap<Token, DataSourceRef>,
}

impl RetainedContainer {
    /// Starts building a retained container.
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder {
            children: BTreeMap::new(),
        }
    }

    /// An empty retained container.
    #[must_use]
    pub fn empty() -> DataSourceRef {
        Self::builder().build()
    }

    /// Builds a retained container directly from entries.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (Token, DataSourceRef)>) -> DataSourceRef {
        Arc::new(Self {
            children: entries.into_iter().collect(),
        })
    }
}

impl core::fmt::Debug for RetainedContainer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RetainedContainer")
            .field("names", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DataSource for RetainedContainer {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        Some(self)
    }
}

impl ContainerDataSource for RetainedContainer {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        self.children.get(name).cloned()
    }

    fn names(&self) -> Vec<Token> {
        self.children.keys().cloned().collect()
    }
}

/// Builder for [`RetainedContainer`].
pub struct ContainerBuilder {
    children: BTreeMap<Token, DataSourceRef>,
}

impl ContainerBuilder {
    /// Sets a child source, replacing any previous child of that name.
    #[must_use]
    pub fn set(mut self, name: impl Into<Token>, child: DataSourceRef) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    /// Sets a child source if `child` is `Some`.
    #[must_use]
    pub fn set_optional(self, name: impl Into<Token>, child: Option<DataSourceRef>) -> Self {
        match child {
            Some(child) => self.set(name, child),
            None => self,
        }
    }

    /// Finishes the container.
    #[must_use]
    pub fn build(self) -> DataSourceRef {
        Arc::new(RetainedContainer {
            children: self.children,
        })
    }
}

impl core::fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("names", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An immutable, time-invariant leaf value.
pub struct RetainedValue {
    value: Value,
}

impl RetainedValue {
    /// Wraps a value as a constant sampled source.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> DataSourceRef {
        Arc::new(Self {
            value: value.into(),
        })
    }
}

impl core::fmt::Debug for RetainedValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("RetainedValue").field(&self.value).finish()
    }
}

impl DataSource for RetainedValue {
    fn as_sampled(&self) -> Option<&dyn SampledDataSource> {
        Some(self)
    }
}

impl SampledDataSource for RetainedValue {
    fn value(&self, _shutter_offset: f64) -> Value {
        self.value.clone()
    }
}
