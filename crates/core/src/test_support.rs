// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::method::{MethodSpec, SlotArity};
use crate::options::{OptionSpec, OptionType, Options};
use serde_json::Value;

// ── Proptest strategies ─────────────────────────────────────────────────

pub mod strategies {
    use proptest::prelude::*;
    use serde_json::Value;

    /// Arbitrary JSON values of bounded depth, without floats.
    pub fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9 ]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }
}

// ── Factories ───────────────────────────────────────────────────────────

/// Options map from a `json!` object literal.
pub fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        _ => Options::new(),
    }
}

/// A method with one int option `n` (default 1) and no slots.
pub fn leaf_method(name: &str, hash: &str) -> MethodSpec {
    MethodSpec::new(name, hash).with_option(OptionSpec::new("n", OptionType::Int).default_value(1))
}

/// A method with a single-job slot `previous` and a list slot `inputs`.
pub fn joining_method(name: &str, hash: &str) -> MethodSpec {
    leaf_method(name, hash)
        .with_job_slot("previous", SlotArity::Single)
        .with_job_slot("inputs", SlotArity::List)
        .with_dataset_slot("source", SlotArity::Single)
}
