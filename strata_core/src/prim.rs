// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The prim value type.

use core::fmt;

use strata_data::DataSourceRef;
use strata_path::Token;

/// The value a scene index associates with a path: a type and a data source.
///
/// A prim with an empty type and no data source is the *placeholder*: the
/// canonical "nothing here" value, returned for implicit ancestors and for
/// paths the index knows nothing about. Absence is a value, not an error.
#[derive(Clone, Default)]
pub struct Prim {
    /// The prim's type token; empty for placeholders.
    pub prim_type: Token,
    /// The prim's attribute tree, if any.
    pub data_source: Option<DataSourceRef>,
}

impl Prim {
    /// Creates a prim.
    #[must_use]
    pub fn new(prim_type: impl Into<Token>, data_source: Option<DataSourceRef>) -> Self {
        Self {
            prim_type: prim_type.into(),
            data_source,
        }
    }

    /// The placeholder prim: empty type, no data source.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// Whether this is the placeholder prim.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.prim_type.is_empty() && self.data_source.is_none()
    }
}

impl fmt::Debug for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prim")
            .field("prim_type", &self.prim_type)
            .field("has_data_source", &self.data_source.is_some())
            .finish()
    }
}
