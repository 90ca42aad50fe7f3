// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unresolved requests as submitted by clients.

use crate::fingerprint::DependencyKind;
use crate::id::JobId;
use crate::options::Options;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Where a dependency slot gets its job from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobInput {
    /// A job that already exists.
    Existing(JobId),
    /// A request from the submission's `named` table.
    Named(String),
    /// An inline request, built if it is not cached.
    Build(Box<JobRequest>),
}

impl JobInput {
    pub fn build(request: JobRequest) -> Self {
        JobInput::Build(Box::new(request))
    }

    pub fn named(name: impl Into<String>) -> Self {
        JobInput::Named(name.into())
    }
}

impl From<JobId> for JobInput {
    fn from(id: JobId) -> Self {
        JobInput::Existing(id)
    }
}

/// One dependency declaration for a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub slot: String,
    pub kind: DependencyKind,
    pub input: JobInput,
    /// Dataset name inside the producing job (dataset bindings only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
}

impl Binding {
    pub fn job(slot: impl Into<String>, input: impl Into<JobInput>) -> Self {
        Self { slot: slot.into(), kind: DependencyKind::Job, input: input.into(), dataset: None }
    }

    pub fn dataset(slot: impl Into<String>, input: impl Into<JobInput>, name: impl Into<String>) -> Self {
        Self {
            slot: slot.into(),
            kind: DependencyKind::Dataset,
            input: input.into(),
            dataset: Some(name.into()),
        }
    }
}

/// An ask to run one method with concrete inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub method: String,
    #[serde(default)]
    pub options: Options,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
    /// WorkDir to allocate in; the orchestrator's target when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

impl JobRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self { method: method.into(), options: Options::new(), bindings: Vec::new(), workdir: None }
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    pub fn in_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }
}

/// A root request plus requests it may refer to by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub root: JobRequest,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named: BTreeMap<String, JobRequest>,
    /// Execute the root even if an identical job exists.
    #[serde(default)]
    pub force_build: bool,
    /// Running job submitting this as a subjob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<JobId>,
}

impl Submission {
    pub fn new(root: JobRequest) -> Self {
        Self { root, named: BTreeMap::new(), force_build: false, parent: None }
    }

    pub fn with_named(mut self, name: impl Into<String>, request: JobRequest) -> Self {
        self.named.insert(name.into(), request);
        self
    }

    pub fn force_build(mut self, force: bool) -> Self {
        self.force_build = force;
        self
    }

    pub fn parent(mut self, parent: JobId) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
