// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use ax_core::{ErrorKind, JobId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The log cannot be replayed into a consistent index.
    #[error("workdir {workdir} is inconsistent at log entry {seq}: {reason}")]
    Inconsistent { workdir: String, seq: u64, reason: String },
    /// An append that would make the log inconsistent was refused.
    #[error("workdir {workdir} refused record: {reason}")]
    Rejected { workdir: String, reason: String },
    #[error("unknown workdir {0}")]
    UnknownWorkDir(String),
    #[error("unknown job {0}")]
    UnknownJob(JobId),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CacheInconsistency
    }
}
