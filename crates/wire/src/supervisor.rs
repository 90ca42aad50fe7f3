// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator ⇄ supervisor messages.
//!
//! Every request that expects a reply carries a token chosen by the
//! orchestrator; replies and status events echo it back so several jobs
//! can share one supervisor channel.

use crate::job::JobOutcome;
use ax_core::{JobId, MethodSpec, PhaseTimeouts, StatusEvent};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a supervisor needs to run one job.
///
/// The job process itself only gets `job_dir`; the rest of its
/// configuration comes from `setup.json` in that directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteAssignment {
    pub job: JobId,
    pub method: String,
    pub job_dir: PathBuf,
    pub timeouts: PhaseTimeouts,
    pub kill_grace_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorRequest {
    /// List the methods this runtime provides.
    Describe { token: u64 },
    Execute { token: u64, assignment: ExecuteAssignment },
    /// Terminate the job started by `Execute` with the same token.
    Cancel { token: u64 },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorEvent {
    Methods { token: u64, methods: Vec<MethodSpec> },
    Status { token: u64, event: StatusEvent },
    Finished { token: u64, outcome: JobOutcome },
}

impl SupervisorEvent {
    pub fn token(&self) -> u64 {
        match self {
            SupervisorEvent::Methods { token, .. }
            | SupervisorEvent::Status { token, .. }
            | SupervisorEvent::Finished { token, .. } => *token,
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
