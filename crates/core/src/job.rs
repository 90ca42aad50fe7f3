// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job records as stored in a WorkDir.

use crate::error::FailureCause;
use crate::fingerprint::Fingerprint;
use crate::id::JobId;
use crate::options::Options;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A dataset inside a job, passed through by reference only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetRef {
    pub job: JobId,
    pub name: String,
}

impl DatasetRef {
    pub fn new(job: JobId, name: impl Into<String>) -> Self {
        Self { job, name: name.into() }
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job, self.name)
    }
}

/// Wall time spent per phase, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub prepare_ms: u64,
    pub analyze_ms: u64,
    /// Per-slice worker time, indexed by slice.
    #[serde(default)]
    pub slice_ms: Vec<u64>,
    pub synthesize_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Finished,
    Aborted { cause: FailureCause },
}

crate::simple_display! {
    JobStatus {
        InProgress => "in-progress",
        Finished => "finished",
        Aborted { .. } => "aborted",
    }
}

/// One execution of a method, identified by its WorkDir and number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub fingerprint: Fingerprint,
    pub method: String,
    pub source_hash: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub equivalent_hashes: Vec<String>,
    pub options: Options,
    /// Dependency jobs per slot, in binding order.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub jobs: BTreeMap<String, Vec<JobId>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub datasets: BTreeMap<String, Vec<DatasetRef>>,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    /// The job whose prepare or synthesize phase submitted this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<JobId>,
    /// Jobs this one submitted while running, in submit order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjobs: Vec<JobId>,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl Job {
    pub fn is_finished(&self) -> bool {
        matches!(self.status, JobStatus::Finished)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self.status, JobStatus::InProgress)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, JobStatus::Aborted { .. })
    }

    /// Every job this one read from, through job or dataset slots.
    pub fn dependency_ids(&self) -> impl Iterator<Item = &JobId> {
        self.jobs
            .values()
            .flatten()
            .chain(self.datasets.values().flatten().map(|d| &d.job))
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        into {
            id: JobId = JobId::new("test", 0),
            fingerprint: Fingerprint = Fingerprint::from_hex("00"),
            method: String = "echo",
            source_hash: String = "h1",
        }
        set {
            equivalent_hashes: Vec<String> = Vec::new(),
            options: Options = Options::new(),
            jobs: BTreeMap<String, Vec<JobId>> = BTreeMap::new(),
            datasets: BTreeMap<String, Vec<DatasetRef>> = BTreeMap::new(),
            started_at_ms: u64 = 1_000,
            ended_at_ms: Option<u64> = None,
            profile: Option<Profile> = None,
            files: Vec<String> = Vec::new(),
            parent: Option<JobId> = None,
            subjobs: Vec<JobId> = Vec::new(),
            status: JobStatus = JobStatus::InProgress,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
