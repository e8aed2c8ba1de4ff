// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaf value kinds.

use core::hash::{Hash, Hasher};

use strata_path::{ScenePath, Token};

/// A leaf value sampled from a data source.
///
/// This is a closed set of the value kinds the scene-index core itself needs
/// to inspect (paths for re-rooting, tokens for classification, matrices and
/// scalars for derived primvars). Renderer-specific payloads travel through
/// the core untouched as whole data sources, not as `Value`s.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A double-precision float.
    Float(f64),
    /// A name token.
    Token(Token),
    /// An arbitrary string.
    String(String),
    /// A scene path.
    Path(ScenePath),
    /// An array of scene paths.
    PathVec(Vec<ScenePath>),
    /// An array of tokens.
    TokenVec(Vec<Token>),
    /// An array of integers.
    IntVec(Vec<i64>),
    /// A 4x4 row-major matrix.
    Matrix([[f64; 4]; 4]),
    /// An array of 4x4 matrices.
    MatrixVec(Vec<[[f64; 4]; 4]>),
}

impl Value {
    /// The identity matrix value.
    #[must_use]
    pub fn identity_matrix() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self::Matrix(m)
    }

    /// The boolean, if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is an integer value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The token, if this is a token value.
    #[must_use]
    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Self::Token(t) => Some(t),
            _ => None,
        }
    }

    /// The path, if this is a path value.
    #[must_use]
    pub fn as_path(&self) -> Option<&ScenePath> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    /// The path array, if this is a path-array value.
    #[must_use]
    pub fn as_paths(&self) -> Option<&[ScenePath]> {
        match self {
            Self::PathVec(v) => Some(v),
            _ => None,
        }
    }

    /// The token array, if this is a token-array value.
    #[must_use]
    pub fn as_tokens(&self) -> Option<&[Token]> {
        match self {
            Self::TokenVec(v) => Some(v),
            _ => None,
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Token(t) => t.hash(state),
            Self::String(s) => s.hash(state),
            Self::Path(p) => p.hash(state),
            Self::PathVec(v) => v.hash(state),
            Self::TokenVec(v) => v.hash(state),
            Self::IntVec(v) => v.hash(state),
            Self::Matrix(m) => hash_matrix(m, state),
            Self::MatrixVec(v) => {
                v.len().hash(state);
                for m in v {
                    hash_matrix(m, state);
                }
            }
        }
    }
}

fn hash_matrix<H: Hasher>(m: &[[f64; 4]; 4], state: &mut H) {
    for row in m {
        for x in row {
            x.to_bits().hash(state);
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Token> for Value {
    fn from(t: Token) -> Self {
        Self::Token(t)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Token(Token::new(s))
    }
}

impl From<ScenePath> for Value {
    fn from(p: ScenePath) -> Self {
        Self::Path(p)
    }
}

impl From<Vec<ScenePath>> for Value {
    fn from(v: Vec<ScenePath>) -> Self {
        Self::PathVec(v)
    }
}
