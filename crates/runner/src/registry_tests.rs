// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::builtin::{self, Echo};
use ax_core::MethodCatalog;

#[test]
fn duplicate_names_are_rejected() {
    let mut registry = MethodRegistry::new();
    registry.register(Echo).unwrap();
    let err = registry.register(Echo).unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate(ref name) if name == "echo"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn lookup_by_name() {
    let registry = builtin::registry().unwrap();
    assert!(registry.get("slice_sum").is_some());
    assert!(registry.get("nope").is_none());
}

#[test]
fn builtin_specs_form_a_valid_catalog() {
    let registry = builtin::registry().unwrap();
    let mut catalog = MethodCatalog::new();
    for spec in registry.specs() {
        catalog.insert("default", spec).unwrap();
    }
    assert_eq!(catalog.len(), registry.len());
    assert!(!registry.is_empty());
}

#[test]
fn source_hashes_are_distinct_per_method() {
    let specs = builtin::registry().unwrap().specs();
    let mut hashes: Vec<_> = specs.iter().map(|s| s.source_hash.clone()).collect();
    hashes.sort();
    hashes.dedup();
    assert_eq!(hashes.len(), specs.len());
}
