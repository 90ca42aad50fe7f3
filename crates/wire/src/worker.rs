// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job process ⇄ worker messages.

use ax_core::StatusEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sent once on a worker's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerAssignment {
    pub slice: u32,
    /// Value returned by the prepare phase, `null` when there was none.
    #[serde(default)]
    pub prepared: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Status { event: StatusEvent },
    Done {
        slice: u32,
        result: Value,
        /// The method asked to skip synthesize.
        #[serde(default)]
        finish: bool,
    },
    Failed { slice: u32, message: String },
}
