// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hierarchical scene paths.

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::token::Token;

/// An immutable, hierarchical, totally-ordered prim identifier.
///
/// A path is a sequence of [`Token`] segments; the absolute root is the empty
/// sequence and renders as `/`. Cloning shares the segment storage.
///
/// The derived order compares segment sequences lexicographically. Under this
/// order an ancestor sorts before every one of its descendants and each
/// subtree occupies a contiguous range, so iterating a sorted path collection
/// is a depth-first walk of the hierarchy.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScenePath {
    segments: Arc<[Token]>,
}

impl ScenePath {
    /// The absolute root path `/`.
    #[must_use]
    pub fn root() -> Self {
        Self {
            segments: Arc::from([] as [Token; 0]),
        }
    }

    /// Builds a path from segments.
    #[must_use]
    pub fn from_segments(segments: impl IntoIterator<Item = Token>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The path's segments.
    #[must_use]
    pub fn segments(&self) -> &[Token] {
        &self.segments
    }

    /// The final segment, or the empty token for the root.
    #[must_use]
    pub fn name(&self) -> Token {
        self.segments.last().cloned().unwrap_or_default()
    }

    /// The parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(self.truncated(self.segments.len() - 1))
    }

    /// The prefix of this path with the given number of segments.
    ///
    /// Returns a clone of `self` if `depth` is not smaller than this path's
    /// depth.
    #[must_use]
    pub fn truncated(&self, depth: usize) -> Self {
        if depth >= self.segments.len() {
            return self.clone();
        }
        Self {
            segments: self.segments[..depth].to_vec().into(),
        }
    }

    /// Appends a child segment.
    #[must_use]
    pub fn append(&self, name: impl Into<Token>) -> Self {
        let mut segments: SmallVec<[Token; 8]> = self.segments.iter().cloned().collect();
        segments.push(name.into());
        Self {
            segments: segments.into_vec().into(),
        }
    }

    /// Appends all segments of `suffix`.
    #[must_use]
    pub fn join(&self, suffix: &Self) -> Self {
        if self.is_root() {
            return suffix.clone();
        }
        if suffix.is_root() {
            return self.clone();
        }
        Self {
            segments: self
                .segments
                .iter()
                .chain(suffix.segments.iter())
                .cloned()
                .collect(),
        }
    }

    /// Whether `prefix` is an ancestor of, or equal to, this path.
    ///
    /// The root is a prefix of every path.
    #[must_use]
    pub fn has_prefix(&self, prefix: &Self) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == *prefix.segments
    }

    /// Whether `prefix` is a *proper* ancestor of this path.
    #[must_use]
    pub fn has_proper_prefix(&self, prefix: &Self) -> bool {
        self.segments.len() > prefix.segments.len() && self.has_prefix(prefix)
    }

    /// Replaces the leading `old` prefix with `new`.
    ///
    /// Returns `None` if this path is not under `old`.
    #[must_use]
    pub fn replace_prefix(&self, old: &Self, new: &Self) -> Option<Self> {
        if !self.has_prefix(old) {
            return None;
        }
        let rest = &self.segments[old.segments.len()..];
        if rest.is_empty() {
            return Some(new.clone());
        }
        Some(Self {
            segments: new
                .segments
                .iter()
                .chain(rest.iter())
                .cloned()
                .collect(),
        })
    }

    /// Proper prefixes of this path, shallowest first, excluding the root.
    ///
    /// For `/a/b/c` this yields `/a`, `/a/b`.
    pub fn proper_prefixes(&self) -> impl Iterator<Item = Self> + '_ {
        (1..self.segments.len()).map(move |depth| self.truncated(depth))
    }

    /// The direct child of this path on the way to `descendant`.
    ///
    /// Returns `None` unless `descendant` is strictly below this path. Used
    /// to synthesize the single intermediate hop when enumerating children of
    /// an ancestor of some deeper anchor.
    #[must_use]
    pub fn child_toward(&self, descendant: &Self) -> Option<Self> {
        if !descendant.has_proper_prefix(self) {
            return None;
        }
        Some(self.append(descendant.segments[self.segments.len()].clone()))
    }
}

impl Default for ScenePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for segment in self.segments.iter() {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ScenePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScenePath({self})")
    }
}

/// Error produced when parsing a malformed path string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathParseError {
    text: String,
}

impl fmt::Display for PathParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed scene path {:?}", self.text)
    }
}

impl core::error::Error for PathParseError {}

impl FromStr for ScenePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(PathParseError { text: s.to_owned() });
        };
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for segment in rest.split('/') {
            if segment.is_empty() {
                return Err(PathParseError { text: s.to_owned() });
            }
            segments.push(Token::new(segment));
        }
        Ok(Self::from_segments(segments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> ScenePath {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        assert_eq!(p("/").to_string(), "/");
        assert_eq!(p("/a/b/c").to_string(), "/a/b/c");
        assert!("a/b".parse::<ScenePath>().is_err());
        assert!("/a//b".parse::<ScenePath>().is_err());
        assert!("".parse::<ScenePath>().is_err());
    }

    #[test]
    fn parent_and_append() {
        assert_eq!(p("/a/b").parent(), Some(p("/a")));
        assert_eq!(p("/a").parent(), Some(ScenePath::root()));
        assert_eq!(ScenePath::root().parent(), None);
        assert_eq!(ScenePath::root().append("a"), p("/a"));
        assert_eq!(p("/a").append("b"), p("/a/b"));
    }

    #[test]
    fn prefix_relations() {
        assert!(p("/a/b/c").has_prefix(&p("/a/b")));
        assert!(p("/a/b").has_prefix(&p("/a/b")));
        assert!(p("/a/b").has_prefix(&ScenePath::root()));
        assert!(!p("/a/bc").has_prefix(&p("/a/b")));
        assert!(p("/a/b").has_proper_prefix(&p("/a")));
        assert!(!p("/a/b").has_proper_prefix(&p("/a/b")));
    }

    #[test]
    fn replace_prefix_relocates() {
        assert_eq!(
            p("/src/x/y").replace_prefix(&p("/src"), &p("/dst/deep")),
            Some(p("/dst/deep/x/y"))
        );
        assert_eq!(p("/src").replace_prefix(&p("/src"), &p("/dst")), Some(p("/dst")));
        assert_eq!(p("/other").replace_prefix(&p("/src"), &p("/dst")), None);
        assert_eq!(
            p("/a/b").replace_prefix(&ScenePath::root(), &p("/pre")),
            Some(p("/pre/a/b"))
        );
    }

    #[test]
    fn order_is_depth_first() {
        let mut paths = vec![p("/a/d"), p("/a/b/c"), p("/a"), p("/a/b"), p("/b")];
        paths.sort();
        assert_eq!(
            paths,
            vec![p("/a"), p("/a/b"), p("/a/b/c"), p("/a/d"), p("/b")]
        );
    }

    #[test]
    fn proper_prefixes_shallowest_first() {
        let prefixes: Vec<_> = p("/a/b/c").proper_prefixes().collect();
        assert_eq!(prefixes, vec![p("/a"), p("/a/b")]);
        assert_eq!(p("/a").proper_prefixes().count(), 0);
    }

    #[test]
    fn child_toward_synthesizes_one_hop() {
        assert_eq!(p("/a").child_toward(&p("/a/b/c/d")), Some(p("/a/b")));
        assert_eq!(ScenePath::root().child_toward(&p("/x/y")), Some(p("/x")));
        assert_eq!(p("/a/b").child_toward(&p("/a/b")), None);
        assert_eq!(p("/z").child_toward(&p("/a/b")), None);
    }
}
