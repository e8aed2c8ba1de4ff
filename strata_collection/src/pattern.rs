// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compiled path patterns.

use core::fmt;
use core::str::FromStr;

use strata_path::{ScenePath, Token};

/// One step of a compiled pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Component {
    /// A literal segment name.
    Literal(Token),
    /// A segment glob; `*` matches any run of characters.
    Glob(String),
    /// `//`: any number of intermediate segments, including none.
    RecursiveDescent,
}

/// A named predicate clause, e.g. `{type:mesh}`.
///
/// The argument is optional: `{visible}` parses with an empty argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PredicateCall {
    /// The predicate's registered name.
    pub name: Token,
    /// The raw argument text after the `:`, empty when absent.
    pub argument: String,
}

/// A compiled absolute path pattern with an optional trailing predicate.
///
/// Matching is over whole segments. The pattern `//` alone matches every
/// path; `//*bar` matches any path whose final segment ends in `bar`, at
/// any depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPattern {
    components: Vec<Component>,
    predicate: Option<PredicateCall>,
}

/// The outcome of matching a pattern against one path, with a flag for
/// whether that outcome necessarily holds for every descendant path too.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PatternMatch {
    pub(crate) matched: bool,
    pub(crate) constant_over_descendants: bool,
}

impl PathPattern {
    /// The predicate clause, if the expression carried one.
    #[must_use]
    pub fn predicate(&self) -> Option<&PredicateCall> {
        self.predicate.as_ref()
    }

    /// Whether this pattern matches every path unconditionally (`//` with
    /// no predicate).
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.predicate.is_none() && self.components == [Component::RecursiveDescent]
    }

    /// Matches the pattern (ignoring any predicate clause) against `path`.
    ///
    /// The component list is run as a small NFA over the path's segments: a
    /// `//` component stays active while consuming arbitrary segments and
    /// can also be skipped outright. The live-state set after the final
    /// segment tells us three things at once: whether the path matched,
    /// whether every descendant must match (the pattern's tail is a live
    /// `//`), and whether no descendant can ever match (no live states
    /// remain).
    pub(crate) fn match_segments(&self, path: &ScenePath) -> PatternMatch {
        let n = self.components.len();
        let mut states = close(vec![0], &self.components);
        for segment in path.segments() {
            let mut next = Vec::new();
            for &i in &states {
                if i == n {
                    continue;
                }
                match &self.components[i] {
                    Component::RecursiveDescent => push_state(&mut next, i),
                    Component::Literal(name) => {
                        if name == segment.as_str() {
                            push_state(&mut next, i + 1);
                        }
                    }
                    Component::Glob(glob) => {
                        if glob_matches(glob, segment.as_str()) {
                            push_state(&mut next, i + 1);
                        }
                    }
                }
            }
            states = close(next, &self.components);
            if states.is_empty() {
                break;
            }
        }
        let matched = states.contains(&n);
        let tail_descent = n > 0
            && self.components[n - 1] == Component::RecursiveDescent
            && states.contains(&(n - 1));
        let dead = !states.iter().any(|&i| i < n);
        PatternMatch {
            matched,
            constant_over_descendants: if matched { tail_descent } else { dead },
        }
    }
}

/// Epsilon-closure: a `//` component may match zero segments.
fn close(mut states: Vec<usize>, components: &[Component]) -> Vec<usize> {
    let mut cursor = 0;
    while cursor < states.len() {
        let i = states[cursor];
        if i < components.len() && components[i] == Component::RecursiveDescent {
            push_state(&mut states, i + 1);
        }
        cursor += 1;
    }
    states
}

fn push_state(states: &mut Vec<usize>, state: usize) {
    if !states.contains(&state) {
        states.push(state);
    }
}

/// Segment glob match with `*` as the only metacharacter.
fn glob_matches(glob: &str, text: &str) -> bool {
    let glob: Vec<char> = glob.chars().collect();
    let text: Vec<char> = text.chars().collect();
    // Two-pointer scan with single-level backtracking to the last star.
    let (mut g, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if g < glob.len() && glob[g] == '*' {
            star = Some((g, t));
            g += 1;
        } else if g < glob.len() && glob[g] == text[t] {
            g += 1;
            t += 1;
        } else if let Some((sg, st)) = star {
            g = sg + 1;
            t = st + 1;
            star = Some((sg, st + 1));
        } else {
            return false;
        }
    }
    while g < glob.len() && glob[g] == '*' {
        g += 1;
    }
    g == glob.len()
}

/// Error produced when parsing a malformed collection expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternParseError {
    text: String,
}

impl fmt::Display for PatternParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed collection expression {:?}", self.text)
    }
}

impl core::error::Error for PatternParseError {}

impl FromStr for PathPattern {
    type Err = PatternParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PatternParseError { text: s.to_owned() };

        // A predicate clause, if present, sits at the very end.
        let (pattern_text, predicate) = match s.find('{') {
            Some(open) => {
                let clause = &s[open..];
                let inner = clause
                    .strip_prefix('{')
                    .and_then(|c| c.strip_suffix('}'))
                    .ok_or_else(err)?;
                if inner.contains('{') || inner.is_empty() {
                    return Err(err());
                }
                let (name, argument) = match inner.split_once(':') {
                    Some((name, argument)) => (name, argument),
                    None => (inner, ""),
                };
                if name.is_empty() {
                    return Err(err());
                }
                (
                    &s[..open],
                    Some(PredicateCall {
                        name: Token::new(name),
                        argument: argument.to_owned(),
                    }),
                )
            }
            None => (s, None),
        };

        let rest = pattern_text.strip_prefix('/').ok_or_else(err)?;
        let mut components = Vec::new();
        let mut pending_descent = false;
        for piece in rest.split('/') {
            if piece.is_empty() {
                // An empty piece is the second slash of a `//`; consecutive
                // descents collapse.
                if !pending_descent {
                    components.push(Component::RecursiveDescent);
                    pending_descent = true;
                }
                continue;
            }
            pending_descent = false;
            if piece.contains('*') {
                components.push(Component::Glob(piece.to_owned()));
            } else {
                components.push(Component::Literal(Token::new(piece)));
            }
        }
        if components.is_empty() && predicate.is_none() {
            // A bare "/" matches nothing below the root and is almost
            // certainly a mistake.
            return Err(err());
        }
        if components.is_empty() {
            // A predicate with no pattern applies everywhere.
            components.push(Component::RecursiveDescent);
        }
        Ok(Self {
            components,
            predicate,
        })
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut trailing_slash = true;
        write!(f, "/")?;
        for component in &self.components {
            if !trailing_slash {
                write!(f, "/")?;
            }
            trailing_slash = false;
            match component {
                Component::Literal(name) => write!(f, "{name}")?,
                Component::Glob(glob) => write!(f, "{glob}")?,
                Component::RecursiveDescent => {
                    write!(f, "/")?;
                    trailing_slash = true;
                }
            }
        }
        if let Some(call) = &self.predicate {
            if call.argument.is_empty() {
                write!(f, "{{{}}}", call.name)?;
            } else {
                write!(f, "{{{}:{}}}", call.name, call.argument)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> ScenePath {
        s.parse().unwrap()
    }

    fn pat(s: &str) -> PathPattern {
        s.parse().unwrap()
    }

    #[test]
    fn literal_patterns() {
        let pattern = pat("/a/b");
        assert!(pattern.match_segments(&p("/a/b")).matched);
        assert!(!pattern.match_segments(&p("/a")).matched);
        assert!(!pattern.match_segments(&p("/a/b/c")).matched);
        // A mismatched first segment can never match deeper either.
        let miss = pattern.match_segments(&p("/x"));
        assert!(!miss.matched);
        assert!(miss.constant_over_descendants);
    }

    #[test]
    fn recursive_descent_suffix_glob() {
        let pattern = pat("//*bar");
        assert!(pattern.match_segments(&p("/a/foobar")).matched);
        assert!(pattern.match_segments(&p("/a/foobar/bar")).matched);
        assert!(!pattern.match_segments(&p("/a/foobar/baz")).matched);
        assert!(!pattern.match_segments(&ScenePath::root()).matched);
        // Neither outcome is constant: deeper prims may differ.
        assert!(
            !pattern
                .match_segments(&p("/a/foobar"))
                .constant_over_descendants
        );
        assert!(!pattern.match_segments(&p("/a")).constant_over_descendants);
    }

    #[test]
    fn trailing_descent_is_constant_match() {
        let pattern = pat("/a//");
        let hit = pattern.match_segments(&p("/a/b"));
        assert!(hit.matched);
        assert!(hit.constant_over_descendants);
        // "/a" itself: `//` matches zero segments.
        assert!(pattern.match_segments(&p("/a")).matched);
        assert!(!pattern.match_segments(&p("/b")).matched);
    }

    #[test]
    fn trivial_expression() {
        assert!(pat("//").is_trivial());
        assert!(!pat("//*").is_trivial());
        assert!(!pat("//{visible}").is_trivial());
        assert!(pat("//").match_segments(&p("/anything/at/all")).matched);
    }

    #[test]
    fn predicate_clause_parses() {
        let pattern = pat("//geo{type:mesh}");
        let call = pattern.predicate().unwrap();
        assert_eq!(call.name, Token::new("type"));
        assert_eq!(call.argument, "mesh");

        let bare = pat("//{visible}");
        assert_eq!(bare.predicate().unwrap().argument, "");
    }

    #[test]
    fn rejects_malformed() {
        assert!("relative/path".parse::<PathPattern>().is_err());
        assert!("/".parse::<PathPattern>().is_err());
        assert!("/a{unclosed".parse::<PathPattern>().is_err());
        assert!("/a{}".parse::<PathPattern>().is_err());
    }

    #[test]
    fn glob_edge_cases() {
        assert!(glob_matches("*", "anything"));
        assert!(glob_matches("*bar", "foobar"));
        assert!(glob_matches("*bar", "bar"));
        assert!(!glob_matches("*bar", "barfoo"));
        assert!(glob_matches("f*o*r", "foobar"));
        assert!(!glob_matches("", "x"));
        assert!(glob_matches("", ""));
    }

    #[test]
    fn display_round_trips() {
        for text in ["/a/b", "//*bar", "/a//", "//geo{type:mesh}", "//{visible}"] {
            assert_eq!(pat(text).to_string(), text);
        }
    }
}
