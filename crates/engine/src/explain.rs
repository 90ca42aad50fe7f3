// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Why-build: what a submit would do, without doing it.

use crate::orchestrator::{Orchestrator, Plan, SubmitError};
use crate::resolve::Child;
use ax_core::{Clock, Fingerprint, Submission};
use ax_wire::{Candidate, NodeExplanation, Verdict};

/// Prior jobs listed for a node that would be built.
const CANDIDATES: usize = 3;

impl<C: Clock> Orchestrator<C> {
    /// For every node of `submission`, the job it would reuse, or the
    /// closest prior jobs of its method and the options that differ.
    ///
    /// Nodes that would be built get the fingerprint under their method's
    /// current hash; their parents are explained with that fingerprint.
    pub fn explain(&self, submission: &Submission) -> Result<Vec<NodeExplanation>, SubmitError> {
        let Plan { tree, existing } = self.plan(submission)?;
        let inner = &self.inner;
        let recorded = inner.db.equivalence();

        let mut resolved: Vec<Fingerprint> = Vec::with_capacity(tree.len());
        let mut report = Vec::with_capacity(tree.len());
        for (id, node) in tree.nodes().iter().enumerate() {
            let children: Vec<Fingerprint> = node
                .children
                .iter()
                .filter_map(|c| match &c.child {
                    Child::Node(id) => resolved.get(*id).cloned(),
                    Child::Existing(id) => existing.get(id).map(|j| j.fingerprint.clone()),
                })
                .collect();
            let candidates = inner.fingerprints(node, &children, &recorded);
            let current = candidates.first().cloned().unwrap_or_else(|| Fingerprint::from_hex(""));
            let workdir = inner.workdir_of(node);
            let storage = |source| SubmitError::Storage { node: node.label.clone(), source };

            let hit = if submission.force_build && id == tree.root() {
                None
            } else {
                inner.db.lookup_any(workdir, &candidates).map_err(storage)?
            };
            let (fingerprint, verdict) = match hit {
                Some(job) => (job.fingerprint.clone(), Verdict::Reuse { job: job.id }),
                None => {
                    let hashes = inner.hash_class(node, &recorded);
                    let candidates = inner
                        .db
                        .closest(workdir, node.method(), &hashes, &node.options, CANDIDATES)
                        .map_err(storage)?
                        .into_iter()
                        .map(|c| Candidate {
                            job: c.job.id,
                            source_hash: c.job.source_hash,
                            differing: c.differing,
                        })
                        .collect();
                    (current, Verdict::Build { candidates })
                }
            };
            resolved.push(fingerprint.clone());
            report.push(NodeExplanation {
                node: node.label.clone(),
                method: node.method().to_string(),
                fingerprint,
                verdict,
            });
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "explain_tests.rs"]
mod tests;
