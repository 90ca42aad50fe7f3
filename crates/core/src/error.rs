// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by every layer, and the serializable abort cause.

use crate::method::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failed submission or aborted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidOptions,
    CyclicDependency,
    AmbiguousDependency,
    CacheInconsistency,
    SubprocessFailure,
    Timeout,
    ExecutionError,
    Cancelled,
}

crate::simple_display! {
    ErrorKind {
        InvalidOptions => "invalid-options",
        CyclicDependency => "cyclic-dependency",
        AmbiguousDependency => "ambiguous-dependency",
        CacheInconsistency => "cache-inconsistency",
        SubprocessFailure => "subprocess-failure",
        Timeout => "timeout",
        ExecutionError => "execution-error",
        Cancelled => "cancelled",
    }
}

/// Why a job was aborted. Persisted in the job log and carried over IPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum FailureCause {
    /// Method code reported a failure on purpose.
    ExecutionError {
        phase: Phase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slice: Option<u32>,
        message: String,
    },
    /// A job or worker process exited abnormally.
    SubprocessFailure {
        phase: Phase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slice: Option<u32>,
        detail: String,
    },
    /// A phase exceeded its wall-clock bound.
    Timeout {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<Phase>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slice: Option<u32>,
    },
    /// The supervisor lost its job process before a result arrived.
    SubprocessDied { detail: String },
    /// The submitter cancelled.
    Cancelled,
    /// Found in progress when the orchestrator restarted.
    Interrupted,
}

impl FailureCause {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailureCause::ExecutionError { .. } => ErrorKind::ExecutionError,
            FailureCause::SubprocessFailure { .. }
            | FailureCause::SubprocessDied { .. }
            | FailureCause::Interrupted => ErrorKind::SubprocessFailure,
            FailureCause::Timeout { .. } => ErrorKind::Timeout,
            FailureCause::Cancelled => ErrorKind::Cancelled,
        }
    }
}

fn location(phase: Option<&Phase>, slice: Option<u32>) -> String {
    match (phase, slice) {
        (Some(p), Some(s)) => format!(" in {p} slice {s}"),
        (Some(p), None) => format!(" in {p}"),
        (None, Some(s)) => format!(" in slice {s}"),
        (None, None) => String::new(),
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ExecutionError { phase, slice, message } => {
                write!(f, "execution error{}: {message}", location(Some(phase), *slice))
            }
            FailureCause::SubprocessFailure { phase, slice, detail } => {
                write!(f, "subprocess failure{}: {detail}", location(Some(phase), *slice))
            }
            FailureCause::Timeout { phase, slice } => {
                write!(f, "timeout{}", location(phase.as_ref(), *slice))
            }
            FailureCause::SubprocessDied { detail } => write!(f, "subprocess-died: {detail}"),
            FailureCause::Cancelled => f.write_str("cancelled"),
            FailureCause::Interrupted => f.write_str("interrupted by orchestrator restart"),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
