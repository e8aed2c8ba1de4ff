// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Instance classification and the grouping key.

use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;

use strata_core::Prim;
use strata_data::{locator_get, value_at_locator, Value};
use strata_path::{Locator, ScenePath, Token};

/// Scope prim grouping all propagated prototypes under one enclosing root.
pub(crate) const PROPAGATED_PROTOTYPES_SCOPE: &str = "PropagatedPrototypes";
/// Name of the synthesized instancer prim.
pub(crate) const INSTANCER_NAME: &str = "Instancer";
/// Name of the placeholder child where the prototype's contents land.
pub(crate) const PROTOTYPE_NAME: &str = "Prototype";

/// The equivalence key grouping instances onto one instancer.
///
/// Two instances share an instancer exactly when all three parts agree:
/// the already-instanced context containing them, the structural hash of
/// their rendering-relevant bindings, and the prototype they reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceInfo {
    /// The root of the prototype context the instance sits in; the
    /// absolute root for instances in the open scene.
    pub enclosing_root: ScenePath,
    /// Content hash over the instance's constant-primvar names/roles and
    /// its binding values.
    pub binding_hash: Token,
    /// The name of the prototype the instance references.
    pub prototype_name: Token,
}

impl InstanceInfo {
    /// The scope prim carrying a copy of the matched bindings, shared by
    /// every instancer with this binding hash.
    #[must_use]
    pub fn binding_scope_path(&self) -> ScenePath {
        self.enclosing_root
            .append(Token::new(PROPAGATED_PROTOTYPES_SCOPE))
            .append(self.binding_hash.clone())
    }

    /// The parent prim of the instancer for this prototype.
    #[must_use]
    pub fn base_path(&self) -> ScenePath {
        self.binding_scope_path().append(self.prototype_name.clone())
    }

    /// The synthesized instancer prim.
    #[must_use]
    pub fn instancer_path(&self) -> ScenePath {
        self.base_path().append(Token::new(INSTANCER_NAME))
    }

    /// Where a propagating stage inserts the prototype's contents.
    #[must_use]
    pub fn prototype_path(&self) -> ScenePath {
        self.instancer_path().append(Token::new(PROTOTYPE_NAME))
    }
}

/// Recovers the prototype name from a synthesized instancer path, by the
/// naming convention of [`InstanceInfo::instancer_path`]. Returns `None`
/// for paths that are not instancers.
#[must_use]
pub(crate) fn prototype_name_from_instancer_path(path: &ScenePath) -> Option<Token> {
    if path.depth() < 4 {
        return None;
    }
    if path.name() != Token::new(INSTANCER_NAME) {
        return None;
    }
    Some(path.parent()?.name())
}

/// The prototype the prim references, if the prim is an instance.
#[must_use]
pub(crate) fn prototype_path_of(prim: &Prim) -> Option<ScenePath> {
    match value_at_locator(
        prim.data_source.as_ref(),
        &Locator::from_names(["primInfo", "prototypePath"]),
    ) {
        Some(Value::Path(path)) if !path.is_root() => Some(path),
        _ => None,
    }
}

/// The enclosing prototype root authored on the prim, if any.
#[must_use]
pub(crate) fn enclosing_root_of(prim: &Prim) -> Option<ScenePath> {
    match value_at_locator(
        prim.data_source.as_ref(),
        &Locator::from_names(["instancedBy", "prototypeRoots"]),
    ) {
        Some(Value::PathVec(roots)) => roots.first().cloned(),
        _ => None,
    }
}

/// Names of the prim's constant-interpolation primvars, in order.
#[must_use]
pub(crate) fn constant_primvar_names(prim: &Prim) -> Vec<Token> {
    let Some(primvars) =
        locator_get(prim.data_source.as_ref(), &Locator::from_names(["primvars"]))
    else {
        return Vec::new();
    };
    let Some(container) = primvars.as_container() else {
        return Vec::new();
    };
    container
        .names()
        .into_iter()
        .filter(|name| {
            value_at_locator(
                prim.data_source.as_ref(),
                &Locator::from_names(["primvars"])
                    .append(name.clone())
                    .append("interpolation"),
            ) == Some(Value::Token(Token::new("constant")))
        })
        .collect()
}

fn constant_primvar_role_hash(prim: &Prim) -> String {
    let mut name_to_role: BTreeMap<Token, Token> = BTreeMap::new();
    for name in constant_primvar_names(prim) {
        let role = value_at_locator(
            prim.data_source.as_ref(),
            &Locator::from_names(["primvars"])
                .append(name.clone())
                .append("role"),
        )
        .and_then(|value| value.as_token().cloned())
        .unwrap_or_default();
        name_to_role.insert(name, role);
    }
    if name_to_role.is_empty() {
        return "NoPrimvars".to_owned();
    }
    let mut hasher = DefaultHasher::new();
    name_to_role.hash(&mut hasher);
    format!("Primvars{:x}", hasher.finish())
}

fn material_bindings_hash(prim: &Prim) -> String {
    let Some(bindings) = locator_get(
        prim.data_source.as_ref(),
        &Locator::from_names(["materialBindings"]),
    ) else {
        return "NoMaterialBindings".to_owned();
    };
    let Some(container) = bindings.as_container() else {
        return "NoMaterialBindings".to_owned();
    };
    // Bindings are hashed by value: only bit-identical bindings group.
    let mut pairs: Vec<(Token, Option<Value>)> = Vec::new();
    for name in container.names() {
        let value = value_at_locator(
            prim.data_source.as_ref(),
            &Locator::from_names(["materialBindings"]).append(name.clone()),
        );
        pairs.push((name, value));
    }
    let mut hasher = DefaultHasher::new();
    pairs.hash(&mut hasher);
    format!("MaterialBindings{:x}", hasher.finish())
}

fn purpose_hash(prim: &Prim) -> String {
    match value_at_locator(
        prim.data_source.as_ref(),
        &Locator::from_names(["purpose", "purpose"]),
    ) {
        Some(Value::Token(purpose)) if !purpose.as_str().is_empty() => {
            format!("_{purpose}")
        }
        _ => String::new(),
    }
}

/// The structural binding hash for one instance prim.
///
/// Hashes the *set* of constant-primvar names and their roles (values do
/// not matter for grouping) together with the material bindings and the
/// purpose, both hashed by value.
#[must_use]
pub fn compute_binding_hash(prim: &Prim) -> Token {
    Token::new(format!(
        "{}_{}{}",
        constant_primvar_role_hash(prim),
        material_bindings_hash(prim),
        purpose_hash(prim),
    ))
}
