// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strength-ordered container overlay.

use std::sync::Arc;

use strata_path::Token;

use crate::source::{ContainerDataSource, DataSource, DataSourceRef};

/// Composes containers in strength order: earlier sources win.
///
/// `get` returns the strongest hit for a name; when the strongest hit and at
/// least one weaker hit are both containers, the container hits are
/// recursively overlaid, so strength compositing applies at every nesting
/// depth, not just the top level. `names` is the union of the inputs' names,
/// strongest-first, deduplicated.
pub struct OverlayContainer {
    sources: Vec<DataSourceRef>,
}

impl OverlayContainer {
    /// Overlays the given sources, strongest first.
    ///
    /// Non-container sources in the list are ignored for `names` but still
    /// participate in `get` masking (a leaf in a stronger source hides a
    /// container in a weaker one).
    #[must_use]
    pub fn new(sources: Vec<DataSourceRef>) -> DataSourceRef {
        Arc::new(Self { sources })
    }

    /// Overlays two sources.
    #[must_use]
    pub fn over(stronger: DataSourceRef, weaker: DataSourceRef) -> DataSourceRef {
        Self::new(vec![stronger, weaker])
    }
}

impl core::fmt::Debug for OverlayContainer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OverlayContainer")
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl DataSource for OverlayContainer {
    fn as_container(&self) -> Option<&dyn ContainerDataSource> {
        Some(self)
    }
}

impl ContainerDataSource for OverlayContainer {
    fn get(&self, name: &Token) -> Option<DataSourceRef> {
        let mut hits: Vec<DataSourceRef> = Vec::new();
        for source in &self.sources {
            if let Some(container) = source.as_container() {
                if let Some(child) = container.get(name) {
                    hits.push(child);
                }
            }
        }
        let first = hits.first()?.clone();
        if hits.len() > 1 && first.as_container().is_some() {
            let containers: Vec<DataSourceRef> = hits
                .into_iter()
                .filter(|hit| hit.as_container().is_some())
                .collect();
            if containers.len() > 1 {
                return Some(Self::new(containers));
            }
        }
        Some(first)
    }

    fn names(&self) -> Vec<Token> {
        let mut names = Vec::new();
        for source in &self.sources {
            if let Some(container) = source.as_container() {
                for name in container.names() {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retained::{RetainedContainer, RetainedValue};
    use crate::value::Value;

    fn leaf(v: i64) -> DataSourceRef {
        RetainedValue::new(Value::Int(v))
    }

    fn get_int(container: &dyn ContainerDataSource, name: &str) -> Option<i64> {
        container
            .get(&Token::new(name))?
            .as_sampled()?
            .value(0.0)
            .as_int()
    }

    #[test]
    fn stronger_source_wins() {
        let strong = RetainedContainer::builder().set("a", leaf(1)).build();
        let weak = RetainedContainer::builder()
            .set("a", leaf(2))
            .set("b", leaf(3))
            .build();
        let overlay = OverlayContainer::over(strong, weak);
        let container = overlay.as_container().unwrap();
        assert_eq!(get_int(container, "a"), Some(1));
        assert_eq!(get_int(container, "b"), Some(3));
        assert_eq!(container.names(), vec![Token::new("a"), Token::new("b")]);
    }

    #[test]
    fn nested_containers_compose_recursively() {
        let strong = RetainedContainer::builder()
            .set(
                "nested",
                RetainedContainer::builder().set("x", leaf(1)).build(),
            )
            .build();
        let weak = RetainedContainer::builder()
            .set(
                "nested",
                RetainedContainer::builder()
                    .set("x", leaf(10))
                    .set("y", leaf(20))
                    .build(),
            )
            .build();
        let overlay = OverlayContainer::over(strong, weak);
        let nested = overlay
            .as_container()
            .unwrap()
            .get(&Token::new("nested"))
            .unwrap();
        let nested = nested.as_container().unwrap();
        assert_eq!(get_int(nested, "x"), Some(1));
        assert_eq!(get_int(nested, "y"), Some(20));
    }

    #[test]
    fn leaf_in_stronger_masks_weaker_container() {
        let strong = RetainedContainer::builder().set("a", leaf(1)).build();
        let weak = RetainedContainer::builder()
            .set(
                "a",
                RetainedContainer::builder().set("x", leaf(2)).build(),
            )
            .build();
        let overlay = OverlayContainer::over(strong, weak);
        let a = overlay.as_container().unwrap().get(&Token::new("a")).unwrap();
        assert!(a.as_container().is_none());
        assert_eq!(a.as_sampled().unwrap().value(0.0), Value::Int(1));
    }
}
