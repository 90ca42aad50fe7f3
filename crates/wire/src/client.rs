// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client ⇄ daemon messages, one request per connection.

use ax_core::{ErrorKind, Fingerprint, Job, JobId, MethodSpec, Options, Submission};
use serde::{Deserialize, Serialize};

/// Version exchanged in the `Hello` handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request from a client to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Build or reuse the job tree of a submission
    Submit { submission: Submission },

    /// Report, per node, whether a submit would reuse or build
    Explain { submission: Submission },

    /// Look up one job
    Job { id: JobId },

    /// Newest finished job of a method, optionally filtered by options
    Latest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<String>,
        method: String,
        #[serde(default, skip_serializing_if = "Options::is_empty")]
        options: Options,
    },

    /// List the methods every runtime provides
    Methods,

    /// Rebuild an inconsistent WorkDir from its log
    Repair { workdir: String },

    /// Request daemon shutdown
    Shutdown,
}

/// Response from the daemon to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    Hello { version: String },

    Submitted {
        job: JobId,
        reused: bool,
        /// Every job of the tree, dependencies first
        jobs: Vec<JobId>,
    },

    SubmitFailed {
        kind: ErrorKind,
        /// The node that failed, when the failure belongs to one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node: Option<String>,
        message: String,
    },

    Explanation { nodes: Vec<NodeExplanation> },

    Job { job: Option<Box<Job>> },

    Methods { methods: Vec<MethodSpec> },

    Repaired {
        kept: usize,
        dropped: Vec<String>,
        /// Job numbers burned so they are never allocated
        #[serde(default)]
        retired: usize,
    },

    ShuttingDown,

    Error { message: String },
}

/// Why-build report for one node of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExplanation {
    /// Position of the node in the request, e.g. `root/inputs[1]`
    pub node: String,
    pub method: String,
    pub fingerprint: Fingerprint,
    #[serde(flatten)]
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Reuse { job: JobId },
    Build { candidates: Vec<Candidate> },
}

/// A prior job of the same method that did not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub job: JobId,
    pub source_hash: String,
    /// Option keys whose values differ from the request
    pub differing: Vec<String>,
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
