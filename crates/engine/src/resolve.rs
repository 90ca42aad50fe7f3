// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency resolution.
//!
//! Expands a [`Submission`] into a [`DependencyTree`]: every request to
//! build becomes one node, stored after all of its children. Resolution is
//! pure planning; it touches neither the job database nor any process.

use ax_core::{
    DependencyKind, ErrorKind, JobId, JobInput, JobRequest, MethodCatalog, MethodSpec, Options,
    OptionsError, SlotArity, Submission,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Index of a node in [`DependencyTree::nodes`].
pub type NodeId = usize;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{node}: unknown method {method:?}")]
    UnknownMethod { node: String, method: String },

    #[error("{node}: {source}")]
    InvalidOptions {
        node: String,
        #[source]
        source: OptionsError,
    },

    #[error("{node}: method {method} has no {} slot {slot:?}", kind_name(.kind))]
    UnknownSlot { node: String, method: String, slot: String, kind: DependencyKind },

    #[error("{node}: slot {slot:?}: {reason}")]
    BadBinding { node: String, slot: String, reason: String },

    #[error("{node}: slot {slot:?} takes a single input but {count} were bound")]
    Ambiguous { node: String, slot: String, count: usize },

    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    Cyclic { cycle: Vec<String> },

    #[error("{node}: no named request {name:?}")]
    UnknownReference { node: String, name: String },
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::Cyclic { .. } => ErrorKind::CyclicDependency,
            ResolveError::Ambiguous { .. } => ErrorKind::AmbiguousDependency,
            ResolveError::UnknownMethod { .. }
            | ResolveError::InvalidOptions { .. }
            | ResolveError::UnknownSlot { .. }
            | ResolveError::BadBinding { .. }
            | ResolveError::UnknownReference { .. } => ErrorKind::InvalidOptions,
        }
    }

    /// Label of the node the error belongs to.
    pub fn node(&self) -> Option<&str> {
        match self {
            ResolveError::UnknownMethod { node, .. }
            | ResolveError::InvalidOptions { node, .. }
            | ResolveError::UnknownSlot { node, .. }
            | ResolveError::BadBinding { node, .. }
            | ResolveError::Ambiguous { node, .. }
            | ResolveError::UnknownReference { node, .. } => Some(node),
            ResolveError::Cyclic { .. } => None,
        }
    }
}

fn kind_name(kind: &DependencyKind) -> &'static str {
    match kind {
        DependencyKind::Job => "job",
        DependencyKind::Dataset => "dataset",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// Another node of the same tree.
    Node(NodeId),
    /// A job that already exists and is used as is.
    Existing(JobId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildBinding {
    pub kind: DependencyKind,
    pub slot: String,
    /// Position within the slot, in binding order.
    pub position: u32,
    pub child: Child,
    pub dataset: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DependencyNode {
    /// Where the request sits in the submission: `root`, `root/inputs[1]`,
    /// or `@name` for a named request.
    pub label: String,
    pub spec: Arc<MethodSpec>,
    pub runtime: String,
    /// Options after schema normalization.
    pub options: Options,
    pub workdir: Option<String>,
    pub children: Vec<ChildBinding>,
}

impl DependencyNode {
    pub fn method(&self) -> &str {
        &self.spec.name
    }
}

/// Nodes in dependency order: every node comes after its children.
#[derive(Debug, Clone)]
pub struct DependencyTree {
    nodes: Vec<DependencyNode>,
    root: NodeId,
}

impl DependencyTree {
    pub fn nodes(&self) -> &[DependencyNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Existing jobs referenced anywhere in the tree.
    pub fn existing(&self) -> BTreeSet<&JobId> {
        self.nodes
            .iter()
            .flat_map(|n| &n.children)
            .filter_map(|c| match &c.child {
                Child::Existing(id) => Some(id),
                Child::Node(_) => None,
            })
            .collect()
    }

    /// For every node, the nodes that bind it (one entry per binding).
    pub fn parents(&self) -> Vec<Vec<NodeId>> {
        let mut parents = vec![Vec::new(); self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            for binding in &node.children {
                if let Child::Node(child) = binding.child {
                    parents[child].push(id);
                }
            }
        }
        parents
    }
}

/// Expand `submission` into a tree of nodes, children first.
pub fn resolve(submission: &Submission, catalog: &MethodCatalog) -> Result<DependencyTree, ResolveError> {
    let mut resolver = Resolver {
        catalog,
        named: &submission.named,
        nodes: Vec::new(),
        done: HashMap::new(),
        visiting: Vec::new(),
    };
    let root = resolver.request("root".to_string(), &submission.root)?;
    Ok(DependencyTree { nodes: resolver.nodes, root })
}

struct Resolver<'a> {
    catalog: &'a MethodCatalog,
    named: &'a BTreeMap<String, JobRequest>,
    nodes: Vec<DependencyNode>,
    done: HashMap<String, NodeId>,
    visiting: Vec<String>,
}

impl Resolver<'_> {
    fn request(&mut self, label: String, request: &JobRequest) -> Result<NodeId, ResolveError> {
        let entry = self.catalog.get(&request.method).ok_or_else(|| ResolveError::UnknownMethod {
            node: label.clone(),
            method: request.method.clone(),
        })?;
        let spec = Arc::clone(&entry.spec);
        let runtime = entry.runtime.clone();
        let options = spec
            .options
            .normalize(&spec.name, &request.options)
            .map_err(|source| ResolveError::InvalidOptions { node: label.clone(), source })?;

        self.check_slots(&label, &spec, request)?;

        let mut positions: BTreeMap<(DependencyKind, &str), u32> = BTreeMap::new();
        let mut children = Vec::with_capacity(request.bindings.len());
        for binding in &request.bindings {
            let position = positions.entry((binding.kind, binding.slot.as_str())).or_insert(0);
            let child_label = format!("{label}/{}[{position}]", binding.slot);
            let child = match &binding.input {
                JobInput::Existing(id) => Child::Existing(id.clone()),
                JobInput::Named(name) => Child::Node(self.named(&label, name)?),
                JobInput::Build(inner) => Child::Node(self.request(child_label, inner)?),
            };
            children.push(ChildBinding {
                kind: binding.kind,
                slot: binding.slot.clone(),
                position: *position,
                child,
                dataset: binding.dataset.clone(),
            });
            *position += 1;
        }

        self.nodes.push(DependencyNode {
            label,
            spec,
            runtime,
            options,
            workdir: request.workdir.clone(),
            children,
        });
        Ok(self.nodes.len() - 1)
    }

    fn named(&mut self, from: &str, name: &str) -> Result<NodeId, ResolveError> {
        if let Some(&id) = self.done.get(name) {
            return Ok(id);
        }
        if let Some(start) = self.visiting.iter().position(|n| n == name) {
            let mut cycle: Vec<String> = self.visiting[start..].iter().map(|n| format!("@{n}")).collect();
            cycle.push(format!("@{name}"));
            return Err(ResolveError::Cyclic { cycle });
        }
        let request = self.named.get(name).ok_or_else(|| ResolveError::UnknownReference {
            node: from.to_string(),
            name: name.to_string(),
        })?;

        self.visiting.push(name.to_string());
        let id = self.request(format!("@{name}"), request)?;
        self.visiting.pop();
        self.done.insert(name.to_string(), id);
        Ok(id)
    }

    fn check_slots(&self, label: &str, spec: &MethodSpec, request: &JobRequest) -> Result<(), ResolveError> {
        let mut counts: BTreeMap<(DependencyKind, &str), usize> = BTreeMap::new();
        for binding in &request.bindings {
            let slot = match binding.kind {
                DependencyKind::Job => spec.job_slot(&binding.slot),
                DependencyKind::Dataset => spec.dataset_slot(&binding.slot),
            };
            if slot.is_none() {
                return Err(ResolveError::UnknownSlot {
                    node: label.to_string(),
                    method: spec.name.clone(),
                    slot: binding.slot.clone(),
                    kind: binding.kind,
                });
            }
            let bad = |reason: &str| ResolveError::BadBinding {
                node: label.to_string(),
                slot: binding.slot.clone(),
                reason: reason.to_string(),
            };
            match (binding.kind, &binding.dataset) {
                (DependencyKind::Dataset, None) => return Err(bad("dataset binding without a dataset name")),
                (DependencyKind::Dataset, Some(name)) if name.is_empty() => {
                    return Err(bad("empty dataset name"))
                }
                (DependencyKind::Job, Some(_)) => return Err(bad("job binding with a dataset name")),
                _ => {}
            }
            *counts.entry((binding.kind, binding.slot.as_str())).or_insert(0) += 1;
        }

        for ((kind, slot), count) in counts {
            let arity = match kind {
                DependencyKind::Job => spec.job_slot(slot),
                DependencyKind::Dataset => spec.dataset_slot(slot),
            }
            .map(|s| s.arity);
            if arity == Some(SlotArity::Single) && count > 1 {
                return Err(ResolveError::Ambiguous { node: label.to_string(), slot: slot.to_string(), count });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
