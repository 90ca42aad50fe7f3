// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between the orchestrator and whatever runs a job.

use ax_core::{FailureCause, Job, JobId, PhaseTimeouts, Profile};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// One job to run. Its `setup.json` is already in `job_dir`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub job: Job,
    pub runtime: String,
    pub job_dir: PathBuf,
    pub timeouts: PhaseTimeouts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub profile: Profile,
    pub files: Vec<String>,
    /// Jobs the execution submitted, in submit order.
    pub subjobs: Vec<JobId>,
}

#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    /// Run every phase of the job.
    ///
    /// Cancelling `cancel` must make this return `FailureCause::Cancelled`
    /// once the job's processes are gone.
    async fn execute(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport, FailureCause>;
}
