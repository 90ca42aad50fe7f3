// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Records of the per-WorkDir job log.

use ax_core::{DatasetRef, FailureCause, Fingerprint, Job, JobId, Options, Profile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line of `jobs.log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub record: LogRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogRecord {
    /// A job number was allocated and execution is about to start.
    Started { job: Job },
    /// Every phase completed; the job is now a cache hit.
    Finished {
        id: JobId,
        ended_at_ms: u64,
        profile: Profile,
        files: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        subjobs: Vec<JobId>,
    },
    /// Tombstone. The number is retired for good.
    Aborted { id: JobId, ended_at_ms: u64, cause: FailureCause },
    /// A number with no job behind it that must never be allocated,
    /// written when repair or recovery finds traces of a lost record.
    Retired { id: JobId, reason: String },
}

impl LogRecord {
    pub fn job_id(&self) -> &JobId {
        match self {
            LogRecord::Started { job } => &job.id,
            LogRecord::Finished { id, .. }
            | LogRecord::Aborted { id, .. }
            | LogRecord::Retired { id, .. } => id,
        }
    }
}

/// Everything needed to allocate a job except its number.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub fingerprint: Fingerprint,
    pub method: String,
    pub source_hash: String,
    pub equivalent_hashes: Vec<String>,
    pub options: Options,
    pub jobs: BTreeMap<String, Vec<JobId>>,
    pub datasets: BTreeMap<String, Vec<DatasetRef>>,
    pub started_at_ms: u64,
    pub parent: Option<JobId>,
}

/// Outcome data of a successful execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub ended_at_ms: u64,
    pub profile: Profile,
    pub files: Vec<String>,
    pub subjobs: Vec<JobId>,
}

impl NewJob {
    pub(crate) fn into_job(self, id: JobId) -> Job {
        Job {
            id,
            fingerprint: self.fingerprint,
            method: self.method,
            source_hash: self.source_hash,
            equivalent_hashes: self.equivalent_hashes,
            options: self.options,
            jobs: self.jobs,
            datasets: self.datasets,
            started_at_ms: self.started_at_ms,
            ended_at_ms: None,
            profile: None,
            files: Vec::new(),
            parent: self.parent,
            subjobs: Vec::new(),
            status: ax_core::JobStatus::InProgress,
        }
    }
}
