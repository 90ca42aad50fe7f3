// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-node state machine and the hierarchical status feed.

use crate::id::JobId;
use serde::{Deserialize, Serialize};

/// Where a dependency node is in its life.
///
/// ```text
/// Requested -> Resolving -> CacheHit -> Reused
///                        -> CacheMiss -> Dispatching -> Executing -> Finished | Aborted
/// ```
///
/// A miss can still turn into a hit when a racing submission finished the
/// same fingerprint first, and any non-terminal state can abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Requested,
    Resolving,
    CacheHit,
    Reused,
    CacheMiss,
    Dispatching,
    Executing,
    Finished,
    Aborted,
}

crate::simple_display! {
    NodeState {
        Requested => "requested",
        Resolving => "resolving",
        CacheHit => "cache-hit",
        Reused => "reused",
        CacheMiss => "cache-miss",
        Dispatching => "dispatching",
        Executing => "executing",
        Finished => "finished",
        Aborted => "aborted",
    }
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeState::Reused | NodeState::Finished | NodeState::Aborted)
    }

    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;
        match (self, next) {
            (s, Aborted) => !s.is_terminal(),
            (Requested, Resolving)
            | (Resolving, CacheHit)
            | (Resolving, CacheMiss)
            | (CacheHit, Reused)
            | (CacheMiss, CacheHit)
            | (CacheMiss, Dispatching)
            | (Dispatching, Executing)
            | (Executing, Finished) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusKind {
    Enter,
    Leave,
    Progress { message: String },
    Node { state: NodeState },
}

/// One event of the status tree. `path` names the position in the tree,
/// outermost first, e.g. `["slice_sum", "analyze", "slice 3"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobId>,
    pub path: Vec<String>,
    #[serde(flatten)]
    pub kind: StatusKind,
    pub at_ms: u64,
}

impl StatusEvent {
    pub fn new(job: Option<JobId>, path: Vec<String>, kind: StatusKind, at_ms: u64) -> Self {
        Self { job, path, kind, at_ms }
    }

    /// The same event nested one level deeper under `prefix`.
    pub fn nested_under(mut self, prefix: &[String]) -> Self {
        let mut path = prefix.to_vec();
        path.append(&mut self.path);
        self.path = path;
        self
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
