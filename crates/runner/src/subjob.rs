// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submitting subjobs to the daemon that runs the current job.

use crate::method::{MethodContext, MethodError};
use ax_core::{JobId, JobRequest, Submission};
use ax_wire::{recv, send, Request, Response};
use std::path::Path;
use tokio::net::UnixStream;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Submit handle of a running job, from [`MethodContext::subjobs`].
///
/// Every job it returns is recorded as a subjob of the running job. A
/// cancelled job drops its pending submit, which cancels the subjob's
/// build in the daemon.
pub struct Subjobs<'a> {
    ctx: &'a MethodContext,
    socket: &'a Path,
    runtime: Handle,
}

impl<'a> Subjobs<'a> {
    pub(crate) fn new(ctx: &'a MethodContext, socket: &'a Path, runtime: Handle) -> Self {
        Self { ctx, socket, runtime }
    }

    /// Build or reuse `request` and return its job.
    pub fn build(&self, request: JobRequest) -> Result<JobId, MethodError> {
        self.submit(Submission::new(request))
    }

    /// Like [`Subjobs::build`] for a whole submission.
    pub fn submit(&self, submission: Submission) -> Result<JobId, MethodError> {
        let method = submission.root.method.clone();
        let request = Request::Submit { submission: submission.parent(self.ctx.job_id().clone()) };
        debug!(parent = %self.ctx.job_id(), method, "submitting subjob");

        let cancel = self.ctx.cancel_token();
        let response = self.runtime.block_on(async {
            tokio::select! {
                response = exchange(self.socket, &request) => response,
                _ = cancel.cancelled() => Err(MethodError::Cancelled),
            }
        });
        let failed = |message: String| MethodError::Subjob { method: method.clone(), message };
        match response.map_err(|e| match e {
            MethodError::Cancelled => MethodError::Cancelled,
            other => failed(other.to_string()),
        })? {
            Response::Submitted { job, reused, .. } => {
                info!(parent = %self.ctx.job_id(), %job, reused, "subjob ready");
                self.ctx.record_subjob(job.clone());
                Ok(job)
            }
            Response::SubmitFailed { message, .. } | Response::Error { message } => Err(failed(message)),
            other => Err(failed(format!("unexpected response: {other:?}"))),
        }
    }
}

/// One request and its response over a fresh connection.
async fn exchange(socket: &Path, request: &Request) -> Result<Response, MethodError> {
    let mut stream = UnixStream::connect(socket).await?;
    send(&mut stream, request).await.map_err(|e| MethodError::failed(e.to_string()))?;
    recv(&mut stream)
        .await
        .map_err(|e| MethodError::failed(e.to_string()))?
        .ok_or_else(|| MethodError::failed("daemon closed the connection"))
}

#[cfg(test)]
#[path = "subjob_tests.rs"]
mod tests;
