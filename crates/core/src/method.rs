// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Method descriptions and the catalog the orchestrator resolves against.

use crate::equivalence::EquivalenceClasses;
use crate::options::{OptionSchema, OptionSpec, OptionsError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// One of the three execution stages of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prepare,
    Analyze,
    Synthesize,
}

crate::simple_display! {
    Phase {
        Prepare => "prepare",
        Analyze => "analyze",
        Synthesize => "synthesize",
    }
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Prepare, Phase::Analyze, Phase::Synthesize];
}

/// Wall-clock bound per phase. The analyze bound applies to each worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimeouts {
    pub prepare_ms: u64,
    pub analyze_ms: u64,
    pub synthesize_ms: u64,
}

impl PhaseTimeouts {
    pub fn uniform(bound: Duration) -> Self {
        let ms = bound.as_millis() as u64;
        Self { prepare_ms: ms, analyze_ms: ms, synthesize_ms: ms }
    }

    pub fn get(&self, phase: Phase) -> Duration {
        Duration::from_millis(match phase {
            Phase::Prepare => self.prepare_ms,
            Phase::Analyze => self.analyze_ms,
            Phase::Synthesize => self.synthesize_ms,
        })
    }

    /// Upper bound for a whole job.
    pub fn total(&self) -> Duration {
        Duration::from_millis(
            self.prepare_ms.saturating_add(self.analyze_ms).saturating_add(self.synthesize_ms),
        )
    }
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(6 * 60 * 60))
    }
}

/// How many inputs a dependency slot takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotArity {
    /// At most one binding.
    Single,
    /// Any number of bindings, order preserved.
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub name: String,
    pub arity: SlotArity,
}

/// A named, hashed unit of computation as declared by its runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    pub source_hash: String,
    /// Prior source hashes this version produces identical results for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equivalent_hashes: Vec<String>,
    #[serde(default)]
    pub options: OptionSchema,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub job_slots: Vec<SlotSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dataset_slots: Vec<SlotSpec>,
    /// Phases the method implements; the rest are skipped.
    pub phases: Vec<Phase>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, source_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_hash: source_hash.into(),
            equivalent_hashes: Vec::new(),
            options: OptionSchema::new(),
            job_slots: Vec::new(),
            dataset_slots: Vec::new(),
            phases: Phase::ALL.to_vec(),
            description: String::new(),
        }
    }

    pub fn with_option(mut self, spec: OptionSpec) -> Self {
        self.options = self.options.with(spec);
        self
    }

    pub fn with_job_slot(mut self, name: impl Into<String>, arity: SlotArity) -> Self {
        self.job_slots.push(SlotSpec { name: name.into(), arity });
        self
    }

    pub fn with_dataset_slot(mut self, name: impl Into<String>, arity: SlotArity) -> Self {
        self.dataset_slots.push(SlotSpec { name: name.into(), arity });
        self
    }

    pub fn with_phases(mut self, phases: &[Phase]) -> Self {
        let mut phases = phases.to_vec();
        phases.sort();
        phases.dedup();
        self.phases = phases;
        self
    }

    pub fn with_equivalent_hashes<I, S>(mut self, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.equivalent_hashes.extend(hashes.into_iter().map(Into::into));
        self
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn job_slot(&self, name: &str) -> Option<&SlotSpec> {
        self.job_slots.iter().find(|s| s.name == name)
    }

    pub fn dataset_slot(&self, name: &str) -> Option<&SlotSpec> {
        self.dataset_slots.iter().find(|s| s.name == name)
    }

    pub fn has_phase(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("method {method} is provided by both runtime {first} and runtime {second}")]
    Duplicate { method: String, first: String, second: String },
    #[error(transparent)]
    BadDefault(#[from] OptionsError),
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub runtime: String,
    pub spec: Arc<MethodSpec>,
}

/// Every method known to the orchestrator, with the runtime that runs it.
#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    methods: BTreeMap<String, CatalogEntry>,
}

impl MethodCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, runtime: &str, spec: MethodSpec) -> Result<(), CatalogError> {
        if let Some(existing) = self.methods.get(&spec.name) {
            return Err(CatalogError::Duplicate {
                method: spec.name,
                first: existing.runtime.clone(),
                second: runtime.to_string(),
            });
        }
        spec.options.check_defaults(&spec.name)?;
        self.methods.insert(
            spec.name.clone(),
            CatalogEntry { runtime: runtime.to_string(), spec: Arc::new(spec) },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.methods.get(name)
    }

    pub fn spec(&self, name: &str) -> Option<&Arc<MethodSpec>> {
        self.methods.get(name).map(|e| &e.spec)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.methods.values()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Equivalence graph from every method's declared equivalent hashes.
    pub fn equivalence(&self) -> EquivalenceClasses {
        let mut classes = EquivalenceClasses::new();
        for entry in self.methods.values() {
            let spec = &entry.spec;
            classes.declare(&spec.name, &spec.source_hash, &spec.equivalent_hashes);
        }
        classes
    }
}

#[cfg(test)]
#[path = "method_tests.rs"]
mod tests;
