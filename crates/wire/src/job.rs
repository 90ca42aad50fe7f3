// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job process → supervisor messages.

use ax_core::{FailureCause, JobId, Profile, StatusEvent};
use serde::{Deserialize, Serialize};

/// Final result of one job process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Finished {
        profile: Profile,
        #[serde(default)]
        files: Vec<String>,
        /// Jobs submitted by prepare or synthesize, in submit order.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        subjobs: Vec<JobId>,
    },
    Failed {
        cause: FailureCause,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        profile: Option<Profile>,
    },
}

impl JobOutcome {
    pub fn failed(cause: FailureCause) -> Self {
        JobOutcome::Failed { cause, profile: None }
    }
}

/// Frames on a job process's stdout. Exactly one `Result`, last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum JobMessage {
    Status(StatusEvent),
    Result(JobOutcome),
}
