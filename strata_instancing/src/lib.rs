// Copyright 2025 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Strata Instancing: instance aggregation and prototype propagation.
//!
//! Instances are prims that reference a prototype subtree instead of
//! carrying their own geometry. This crate groups equivalent instances onto
//! synthesized instancer prims ([`InstanceAggregationSceneIndex`]) and
//! presents each referenced prototype's contents beneath its instancers
//! ([`PrototypePropagatingSceneIndex`]), recursively for prototypes that
//! contain instances themselves.
//!
//! Two instances are equivalent when they agree on all three parts of
//! [`InstanceInfo`]: the enclosing prototype context, the binding hash over
//! their rendering-relevant attributes, and the referenced prototype.

mod aggregation;
mod info;
mod propagation;

pub use aggregation::InstanceAggregationSceneIndex;
pub use info::{compute_binding_hash, InstanceInfo};
pub use propagation::PrototypePropagatingSceneIndex;
