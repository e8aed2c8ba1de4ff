// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data-source locators and locator sets.

use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::token::Token;

/// A location inside a prim's data-source tree.
///
/// A locator is to a data source what a [`ScenePath`](crate::ScenePath) is to
/// the scene: a sequence of field names. The empty locator addresses the whole
/// data source.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Locator {
    parts: Arc<[Token]>,
}

impl Locator {
    /// The empty locator, addressing the entire data source.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parts: Arc::from([] as [Token; 0]),
        }
    }

    /// Builds a locator from field names.
    #[must_use]
    pub fn new(parts: impl IntoIterator<Item = Token>) -> Self {
        Self {
            parts: parts.into_iter().collect(),
        }
    }

    /// Convenience constructor from string field names.
    #[must_use]
    pub fn from_names<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(parts.into_iter().map(Token::new))
    }

    /// Whether this is the empty locator.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The locator's field names.
    #[must_use]
    pub fn parts(&self) -> &[Token] {
        &self.parts
    }

    /// The first field name, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Token> {
        self.parts.first()
    }

    /// Appends a field name.
    #[must_use]
    pub fn append(&self, name: impl Into<Token>) -> Self {
        let mut parts: SmallVec<[Token; 4]> = self.parts.iter().cloned().collect();
        parts.push(name.into());
        Self {
            parts: parts.into_vec().into(),
        }
    }

    /// The locator without its first field name.
    ///
    /// Returns the empty locator if this locator is empty.
    #[must_use]
    pub fn tail(&self) -> Self {
        if self.parts.is_empty() {
            return self.clone();
        }
        Self {
            parts: self.parts[1..].to_vec().into(),
        }
    }

    /// Whether `prefix` addresses this location or an enclosing one.
    #[must_use]
    pub fn has_prefix(&self, prefix: &Self) -> bool {
        self.parts.len() >= prefix.parts.len()
            && self.parts[..prefix.parts.len()] == *prefix.parts
    }

    /// Whether one of the two locators encloses the other.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.has_prefix(other) || other.has_prefix(self)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(whole prim)");
        }
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({self})")
    }
}

/// A prefix-minimal set of [`Locator`]s.
///
/// Dirtied notices carry a locator set describing which parts of a prim's
/// data source may have changed. Inserting a locator that is already covered
/// by a member is a no-op; inserting a locator that covers existing members
/// replaces them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct LocatorSet {
    members: SmallVec<[Locator; 2]>,
}

impl LocatorSet {
    /// The empty set, intersecting nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The set containing only the empty locator, intersecting everything.
    ///
    /// This is the conventional "everything about this prim changed" set used
    /// by resync-style invalidation.
    #[must_use]
    pub fn universal() -> Self {
        Self::from_locators([Locator::empty()])
    }

    /// Builds a set from locators, minimizing as it goes.
    #[must_use]
    pub fn from_locators(locators: impl IntoIterator<Item = Locator>) -> Self {
        let mut set = Self::new();
        for locator in locators {
            set.insert(locator);
        }
        set
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Inserts a locator, keeping the set prefix-minimal.
    pub fn insert(&mut self, locator: Locator) {
        if self.contains(&locator) {
            return;
        }
        self.members.retain(|member| !member.has_prefix(&locator));
        self.members.push(locator);
    }

    /// Inserts every member of `other`.
    pub fn insert_set(&mut self, other: &Self) {
        for member in &other.members {
            self.insert(member.clone());
        }
    }

    /// Whether `locator` (or an enclosing location) is in the set.
    #[must_use]
    pub fn contains(&self, locator: &Locator) -> bool {
        self.members.iter().any(|member| locator.has_prefix(member))
    }

    /// Whether any member overlaps `locator` in either direction.
    #[must_use]
    pub fn intersects(&self, locator: &Locator) -> bool {
        self.members.iter().any(|member| member.intersects(locator))
    }

    /// Whether any member of `self` overlaps any member of `other`.
    #[must_use]
    pub fn intersects_set(&self, other: &Self) -> bool {
        self.members
            .iter()
            .any(|member| other.intersects(member))
    }

    /// Iterates the set's members.
    pub fn iter(&self) -> impl Iterator<Item = &Locator> {
        self.members.iter()
    }
}

impl fmt::Debug for LocatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.members.iter()).finish()
    }
}

impl FromIterator<Locator> for LocatorSet {
    fn from_iter<I: IntoIterator<Item = Locator>>(iter: I) -> Self {
        Self::from_locators(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(parts: &[&str]) -> Locator {
        Locator::from_names(parts.iter().copied())
    }

    #[test]
    fn locator_prefix_and_intersection() {
        let primvars = loc(&["primvars"]);
        let display_color = loc(&["primvars", "displayColor"]);
        assert!(display_color.has_prefix(&primvars));
        assert!(!primvars.has_prefix(&display_color));
        assert!(primvars.intersects(&display_color));
        assert!(display_color.intersects(&primvars));
        assert!(!loc(&["xform"]).intersects(&primvars));
        assert!(Locator::empty().intersects(&primvars));
    }

    #[test]
    fn set_stays_prefix_minimal() {
        let mut set = LocatorSet::new();
        set.insert(loc(&["primvars", "displayColor"]));
        set.insert(loc(&["primvars", "displayColor", "value"]));
        assert_eq!(set.iter().count(), 1);
        set.insert(loc(&["primvars"]));
        assert_eq!(set.iter().count(), 1);
        assert!(set.contains(&loc(&["primvars", "anything"])));
    }

    #[test]
    fn universal_set_intersects_everything() {
        let set = LocatorSet::universal();
        assert!(set.intersects(&loc(&["xform"])));
        assert!(set.contains(&loc(&["anything", "at", "all"])));
        assert!(!LocatorSet::new().intersects(&loc(&["xform"])));
    }

    #[test]
    fn set_intersection_is_symmetric() {
        let a = LocatorSet::from_locators([loc(&["primvars"])]);
        let b = LocatorSet::from_locators([loc(&["primvars", "displayColor"])]);
        assert!(a.intersects_set(&b));
        assert!(b.intersects_set(&a));
        assert!(!a.intersects_set(&LocatorSet::from_locators([loc(&["xform"])])));
    }
}
