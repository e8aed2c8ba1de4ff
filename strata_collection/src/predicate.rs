// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Named predicates over prims.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use log::error;
use strata_core::Prim;
use strata_data::{locator_get, value_at_locator, Value};
use strata_path::{Locator, Token};

/// The tri-state outcome of one predicate evaluation: the boolean result
/// plus whether that result is guaranteed to hold for every descendant of
/// the evaluated prim.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredicateResult {
    /// Whether the prim satisfied the predicate.
    pub value: bool,
    /// Whether every descendant prim is guaranteed the same outcome.
    pub constant_over_descendants: bool,
}

impl PredicateResult {
    /// A result that says nothing about descendants.
    #[must_use]
    pub fn varying(value: bool) -> Self {
        Self {
            value,
            constant_over_descendants: false,
        }
    }

    /// A result that holds for the prim and all of its descendants.
    #[must_use]
    pub fn constant(value: bool) -> Self {
        Self {
            value,
            constant_over_descendants: true,
        }
    }
}

/// The signature of a registered predicate: prim plus raw argument text.
pub type PredicateFn = Arc<dyn Fn(&Prim, &str) -> PredicateResult + Send + Sync>;

/// A registry of named predicates.
///
/// Libraries compose by layering: [`define`](Self::define) on a clone of an
/// existing library adds (or shadows) predicates while keeping everything
/// the base library provided.
#[derive(Clone, Default)]
pub struct PredicateLibrary {
    entries: HashMap<Token, PredicateFn>,
}

impl PredicateLibrary {
    /// An empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `predicate` under `name`, shadowing any previous entry.
    #[must_use]
    pub fn define(
        mut self,
        name: impl Into<Token>,
        predicate: impl Fn(&Prim, &str) -> PredicateResult + Send + Sync + 'static,
    ) -> Self {
        self.entries.insert(name.into(), Arc::new(predicate));
        self
    }

    /// Evaluates the predicate registered under `name`.
    ///
    /// An unregistered name is a usage error: it is reported and degrades
    /// to a constant non-match, since no descendant could evaluate it
    /// either.
    pub fn evaluate(&self, name: &Token, argument: &str, prim: &Prim) -> PredicateResult {
        match self.entries.get(name) {
            Some(predicate) => predicate(prim, argument),
            None => {
                error!("unknown predicate {name} in collection expression");
                PredicateResult::constant(false)
            }
        }
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &Token) -> bool {
        self.entries.contains_key(name)
    }
}

impl fmt::Debug for PredicateLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&Token> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("PredicateLibrary")
            .field("names", &names)
            .finish()
    }
}

fn dotted_locator(argument: &str) -> Locator {
    Locator::from_names(argument.split('.').filter(|part| !part.is_empty()))
}

/// The stock predicate library.
///
/// Provides `type`, `visible`, `purpose`, `hasPrimvar`, `hasDataSource`,
/// and `materialBindingContains`. Host applications layer their own
/// predicates on top with [`PredicateLibrary::define`].
#[must_use]
pub fn scene_predicate_library() -> PredicateLibrary {
    PredicateLibrary::new()
        .define("type", |prim: &Prim, argument: &str| {
            PredicateResult::varying(prim.prim_type == Token::new(argument))
        })
        .define("visible", |prim: &Prim, _argument: &str| {
            let visible = value_at_locator(
                prim.data_source.as_ref(),
                &Locator::from_names(["visibility", "visible"]),
            )
            .and_then(|value| value.as_bool())
            .unwrap_or(true);
            PredicateResult::varying(visible)
        })
        .define("purpose", |prim: &Prim, argument: &str| {
            let purpose = value_at_locator(
                prim.data_source.as_ref(),
                &Locator::from_names(["purpose", "purpose"]),
            )
            .and_then(|value| value.as_token().cloned())
            .unwrap_or_else(|| Token::new("default"));
            PredicateResult::varying(purpose == Token::new(argument))
        })
        .define("hasPrimvar", |prim: &Prim, argument: &str| {
            // Dotted arguments address namespaced primvars.
            let mut locator = Locator::from_names(["primvars"]);
            for part in argument.split('.').filter(|part| !part.is_empty()) {
                locator = locator.append(Token::new(part));
            }
            PredicateResult::varying(locator_get(prim.data_source.as_ref(), &locator).is_some())
        })
        .define("hasDataSource", |prim: &Prim, argument: &str| {
            let locator = dotted_locator(argument);
            PredicateResult::varying(locator_get(prim.data_source.as_ref(), &locator).is_some())
        })
        .define("materialBindingContains", |prim: &Prim, argument: &str| {
            let binding = value_at_locator(
                prim.data_source.as_ref(),
                &Locator::from_names(["materialBindings", "allPurpose"]),
            );
            let hit = match binding {
                Some(Value::Path(path)) => path.to_string().contains(argument),
                Some(Value::String(text)) => text.contains(argument),
                Some(Value::Token(token)) => token.as_str().contains(argument),
                _ => false,
            };
            PredicateResult::varying(hit)
        })
}
