// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The method contract and what a running method can see.

use ax_core::{
    Clock, DatasetRef, FailureCause, Job, JobId, MethodSpec, Options, Phase, StatusEvent,
    StatusKind, SystemClock,
};
use crate::subjob::Subjobs;
use ax_storage::{JobSetup, RESULT_FILE};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum MethodError {
    /// Deliberate failure; the message reaches the submitter verbatim.
    #[error("{0}")]
    Failed(String),
    #[error("option {name:?}: {reason}")]
    Option { name: String, reason: String },
    #[error("cancelled")]
    Cancelled,
    #[error("no result for dependency {0}")]
    MissingResult(JobId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot submit subjobs: {0}")]
    SubjobsUnavailable(String),
    #[error("subjob {method}: {message}")]
    Subjob { method: String, message: String },
}

impl MethodError {
    pub fn failed(message: impl Into<String>) -> Self {
        MethodError::Failed(message.into())
    }

    pub fn into_cause(self, phase: Phase, slice: Option<u32>) -> FailureCause {
        match self {
            MethodError::Cancelled => FailureCause::Cancelled,
            other => FailureCause::ExecutionError { phase, slice, message: other.to_string() },
        }
    }
}

/// Whether the job goes on to its next phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Continue(Value),
    /// Skip the remaining phases; the value becomes the job's result.
    Finish(Value),
}

impl Flow {
    pub fn value(&self) -> &Value {
        match self {
            Flow::Continue(v) | Flow::Finish(v) => v,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Flow::Continue(v) | Flow::Finish(v) => v,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Flow::Finish(_))
    }
}

/// A named, hashed unit of computation.
///
/// Only the phases listed in [`MethodSpec::phases`] run. Phases run in
/// blocking threads; long loops should call
/// [`MethodContext::check_cancelled`] now and then.
pub trait Method: Send + Sync + 'static {
    fn spec(&self) -> MethodSpec;

    fn prepare(&self, _ctx: &MethodContext) -> Result<Flow, MethodError> {
        Ok(Flow::Continue(Value::Null))
    }

    /// Called once per slice, each in its own worker process.
    fn analyze(&self, _ctx: &MethodContext, _slice: u32, _prepared: &Value) -> Result<Flow, MethodError> {
        Ok(Flow::Continue(Value::Null))
    }

    /// `analyzed` holds one value per slice, in slice order.
    fn synthesize(
        &self,
        _ctx: &MethodContext,
        _prepared: &Value,
        _analyzed: &[Value],
    ) -> Result<Value, MethodError> {
        Ok(Value::Null)
    }
}

/// Emits status events under a fixed path prefix. Never blocks; events are
/// dropped once the reader is gone.
#[derive(Debug, Clone)]
pub struct StatusSender {
    job: JobId,
    path: Vec<String>,
    tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl StatusSender {
    pub fn new(job: JobId, tx: mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self { job, path: Vec::new(), tx: Some(tx) }
    }

    /// A sender that discards everything.
    pub fn discard(job: JobId) -> Self {
        Self { job, path: Vec::new(), tx: None }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.path.push(segment.into());
        child
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn send(&self, kind: StatusKind) {
        if let Some(tx) = &self.tx {
            let event =
                StatusEvent::new(Some(self.job.clone()), self.path.clone(), kind, SystemClock.epoch_ms());
            let _ = tx.send(event);
        }
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.send(StatusKind::Progress { message: message.into() });
    }

    /// Pass on an event produced elsewhere, such as by a worker.
    pub fn forward(&self, event: StatusEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Everything a phase may read about its job.
#[derive(Debug, Clone)]
pub struct MethodContext {
    job: Arc<Job>,
    job_dir: PathBuf,
    slices: u32,
    workdirs: Arc<BTreeMap<String, PathBuf>>,
    socket: Option<PathBuf>,
    phase: Option<Phase>,
    subjobs: Arc<Mutex<Vec<JobId>>>,
    cancel: CancellationToken,
    status: StatusSender,
}

impl MethodContext {
    pub fn new(setup: &JobSetup, job_dir: &Path, cancel: CancellationToken, status: StatusSender) -> Self {
        Self {
            job: Arc::new(setup.job.clone()),
            job_dir: job_dir.to_path_buf(),
            slices: setup.slices.max(1),
            workdirs: Arc::new(setup.workdirs.clone()),
            socket: setup.socket.clone(),
            phase: None,
            subjobs: Arc::default(),
            cancel,
            status,
        }
    }

    /// The context for running `phase`, reporting status under its name.
    pub fn in_phase(&self, phase: Phase) -> Self {
        self.nested(phase.to_string()).with_phase(phase)
    }

    /// The same context marked as running `phase`.
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    /// The same context reporting status under `segment`.
    pub fn nested(&self, segment: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.status = self.status.child(segment);
        ctx
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn job_id(&self) -> &JobId {
        &self.job.id
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn slices(&self) -> u32 {
        self.slices
    }

    pub fn options(&self) -> &Options {
        &self.job.options
    }

    /// Option `name` deserialized as `T`. Options are normalized before the
    /// job starts, so declared options are always present.
    pub fn option<T: DeserializeOwned>(&self, name: &str) -> Result<T, MethodError> {
        let value = self.job.options.get(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| MethodError::Option { name: name.to_string(), reason: e.to_string() })
    }

    /// Dependency jobs bound to `slot`, in binding order.
    pub fn jobs(&self, slot: &str) -> &[JobId] {
        self.job.jobs.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn datasets(&self, slot: &str) -> &[DatasetRef] {
        self.job.datasets.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn dependency_dir(&self, id: &JobId) -> Option<PathBuf> {
        self.workdirs.get(id.workdir()).map(|p| p.join(id.to_string()))
    }

    /// The stored result of dependency `id`.
    pub fn load_result(&self, id: &JobId) -> Result<Value, MethodError> {
        let dir = self.dependency_dir(id).ok_or_else(|| MethodError::MissingResult(id.clone()))?;
        match std::fs::read(dir.join(RESULT_FILE)) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MethodError::MissingResult(id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Handle for submitting subjobs. Refused during analyze.
    pub fn subjobs(&self) -> Result<Subjobs<'_>, MethodError> {
        if self.phase == Some(Phase::Analyze) {
            return Err(MethodError::SubjobsUnavailable("not allowed during analyze".to_string()));
        }
        let socket = self
            .socket
            .as_deref()
            .ok_or_else(|| MethodError::SubjobsUnavailable("no daemon socket in the job setup".to_string()))?;
        let runtime = Handle::try_current()
            .map_err(|_| MethodError::SubjobsUnavailable("not running on the job runtime".to_string()))?;
        Ok(Subjobs::new(self, socket, runtime))
    }

    /// Subjobs submitted so far, in submit order.
    pub fn submitted_subjobs(&self) -> Vec<JobId> {
        self.subjobs.lock().clone()
    }

    pub(crate) fn record_subjob(&self, id: JobId) {
        self.subjobs.lock().push(id);
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), MethodError> {
        if self.is_cancelled() {
            Err(MethodError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn status(&self) -> &StatusSender {
        &self.status
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.status.progress(message);
    }
}

#[cfg(test)]
#[path = "method_tests.rs"]
mod tests;
