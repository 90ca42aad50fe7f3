// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The job process: prepare, analyze across worker processes, synthesize.
//!
//! Everything it needs comes from `setup.json` in the job directory. Its
//! stdout carries status frames and exactly one `Result` frame, last.

use crate::method::{Flow, Method, MethodContext, MethodError, StatusSender};
use crate::output::pump;
use crate::process::{cancel_on_sigterm, describe_exit, panic_message, wait_for};
use crate::registry::MethodRegistry;
use crate::RunnerError;
use ax_core::{FailureCause, MethodSpec, Phase, Profile, StatusKind};
use ax_storage::{read_setup, write_json_atomic, JobSetup, RESULT_FILE};
use ax_wire::{recv, send, JobMessage, JobOutcome, WorkerAssignment, WorkerMessage};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a worker that reported its result may take to exit.
const WORKER_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Run the job in `job_dir`, writing frames to stdout.
pub async fn run_job(registry: &MethodRegistry, program: &Path, job_dir: &Path) -> Result<(), RunnerError> {
    let cancel = CancellationToken::new();
    cancel_on_sigterm(cancel.clone())?;

    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (last_tx, last_rx) = oneshot::channel();
    let writer = tokio::spawn(pump(tokio::io::stdout(), status_rx, last_rx, JobMessage::Status));

    let outcome = match read_setup(job_dir) {
        Ok(setup) => match registry.get(&setup.job.method) {
            Some(method) => {
                let status = StatusSender::new(setup.job.id.clone(), status_tx).child(&setup.job.method);
                let run = JobRun::new(method, setup, program, job_dir, cancel, status);
                run.run().await
            }
            None => JobOutcome::failed(FailureCause::SubprocessFailure {
                phase: Phase::Prepare,
                slice: None,
                detail: format!("method {} is not provided by this runtime", setup.job.method),
            }),
        },
        Err(e) => JobOutcome::failed(FailureCause::SubprocessFailure {
            phase: Phase::Prepare,
            slice: None,
            detail: format!("cannot read job setup: {e}"),
        }),
    };

    let _ = last_tx.send(JobMessage::Result(outcome));
    writer.await.map_err(|e| RunnerError::Task(e.to_string()))??;
    Ok(())
}

/// What one analyze worker produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SliceDone {
    pub slice: u32,
    pub result: Value,
    pub finish: bool,
    pub elapsed_ms: u64,
}

struct JobRun {
    method: Arc<dyn Method>,
    spec: MethodSpec,
    setup: JobSetup,
    program: PathBuf,
    job_dir: PathBuf,
    cancel: CancellationToken,
    ctx: MethodContext,
}

impl JobRun {
    fn new(
        method: Arc<dyn Method>,
        setup: JobSetup,
        program: &Path,
        job_dir: &Path,
        cancel: CancellationToken,
        status: StatusSender,
    ) -> Self {
        let ctx = MethodContext::new(&setup, job_dir, cancel.clone(), status);
        Self {
            spec: method.spec(),
            method,
            setup,
            program: program.to_path_buf(),
            job_dir: job_dir.to_path_buf(),
            cancel,
            ctx,
        }
    }

    async fn run(&self) -> JobOutcome {
        let job = &self.setup.job.id;
        info!(%job, method = %self.spec.name, slices = self.setup.slices, "job started");
        let started = Instant::now();
        let mut profile = Profile::default();
        let result = self.phases(&mut profile).await;
        profile.total_ms = elapsed_ms(started);

        let outcome = match result.and_then(|value| self.store(&value)) {
            Ok(files) => JobOutcome::Finished { profile, files, subjobs: self.ctx.submitted_subjobs() },
            Err(cause) => JobOutcome::Failed { cause, profile: Some(profile) },
        };
        match &outcome {
            JobOutcome::Finished { profile, .. } => info!(%job, total_ms = profile.total_ms, "job finished"),
            JobOutcome::Failed { cause, .. } => warn!(%job, %cause, "job failed"),
        }
        outcome
    }

    async fn phases(&self, profile: &mut Profile) -> Result<Value, FailureCause> {
        let mut prepared = Value::Null;
        if self.spec.has_phase(Phase::Prepare) {
            let started = Instant::now();
            let flow = self.blocking(Phase::Prepare, |method, ctx| method.prepare(&ctx)).await?;
            profile.prepare_ms = elapsed_ms(started);
            match flow {
                Flow::Finish(value) => return Ok(value),
                Flow::Continue(value) => prepared = value,
            }
        }

        let mut analyzed = Vec::new();
        if self.spec.has_phase(Phase::Analyze) {
            let started = Instant::now();
            let status = self.ctx.status().child(Phase::Analyze.to_string());
            status.send(StatusKind::Enter);
            let slices = self.analyze(&prepared, &status).await;
            status.send(StatusKind::Leave);
            let slices = slices?;
            profile.analyze_ms = elapsed_ms(started);
            profile.slice_ms = slices.iter().map(|s| s.elapsed_ms).collect();
            let finish = finish_agreement(&slices)?;
            analyzed = slices.into_iter().map(|s| s.result).collect();
            if finish {
                return Ok(Value::Array(analyzed));
            }
        }

        if !self.spec.has_phase(Phase::Synthesize) {
            return Ok(Value::Null);
        }
        let started = Instant::now();
        let value = self
            .blocking(Phase::Synthesize, move |method, ctx| method.synthesize(&ctx, &prepared, &analyzed))
            .await?;
        profile.synthesize_ms = elapsed_ms(started);
        Ok(value)
    }

    /// Run one phase of method code in a blocking thread under its bound.
    async fn blocking<T, F>(&self, phase: Phase, f: F) -> Result<T, FailureCause>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn Method>, MethodContext) -> Result<T, MethodError> + Send + 'static,
    {
        let ctx = self.ctx.in_phase(phase);
        ctx.status().send(StatusKind::Enter);
        let method = Arc::clone(&self.method);
        let task_ctx = ctx.clone();
        let handle = tokio::task::spawn_blocking(move || f(method, task_ctx));
        let limit = self.setup.timeouts.get(phase);

        let result = tokio::select! {
            joined = tokio::time::timeout(limit, handle) => match joined {
                Ok(Ok(Ok(value))) => Ok(value),
                Ok(Ok(Err(e))) => Err(e.into_cause(phase, None)),
                Ok(Err(e)) => Err(FailureCause::ExecutionError {
                    phase,
                    slice: None,
                    message: panic_message(e),
                }),
                Err(_) => {
                    // The thread cannot be stopped; tell the method to give up.
                    self.cancel.cancel();
                    Err(FailureCause::Timeout { phase: Some(phase), slice: None })
                }
            },
            _ = self.cancel.cancelled() => Err(FailureCause::Cancelled),
        };
        ctx.status().send(StatusKind::Leave);
        result
    }

    /// One worker process per slice, at most `concurrency` at a time. The
    /// first failure stops the rest.
    async fn analyze(&self, prepared: &Value, status: &StatusSender) -> Result<Vec<SliceDone>, FailureCause> {
        let slices = self.setup.slices.max(1);
        let concurrency = self.setup.concurrency.unwrap_or(slices).clamp(1, slices);
        let permits = Arc::new(Semaphore::new(concurrency as usize));
        let mut pool = JoinSet::new();
        for slice in 0..slices {
            let worker = Worker {
                program: self.program.clone(),
                job_dir: self.job_dir.clone(),
                slice,
                prepared: prepared.clone(),
                limit: self.setup.timeouts.get(Phase::Analyze),
                status: status.clone(),
                cancel: self.cancel.clone(),
            };
            let permits = Arc::clone(&permits);
            pool.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|_| FailureCause::Cancelled)?;
                worker.run().await
            });
        }

        let mut done: Vec<Option<SliceDone>> = vec![None; slices as usize];
        let mut failure = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(slice)) => {
                    debug!(slice = slice.slice, elapsed_ms = slice.elapsed_ms, "slice done");
                    if let Some(entry) = done.get_mut(slice.slice as usize) {
                        *entry = Some(slice);
                    }
                }
                Ok(Err(cause)) => {
                    failure = Some(cause);
                    break;
                }
                Err(e) => {
                    failure = Some(FailureCause::SubprocessFailure {
                        phase: Phase::Analyze,
                        slice: None,
                        detail: panic_message(e),
                    });
                    break;
                }
            }
        }
        if let Some(cause) = failure {
            // Dropping the remaining tasks kills their worker processes.
            pool.shutdown().await;
            return Err(cause);
        }
        done.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| FailureCause::SubprocessFailure {
            phase: Phase::Analyze,
            slice: None,
            detail: "not every slice reported a result".to_string(),
        })
    }

    fn store(&self, value: &Value) -> Result<Vec<String>, FailureCause> {
        if value.is_null() {
            return Ok(Vec::new());
        }
        write_json_atomic(&self.job_dir.join(RESULT_FILE), value).map_err(|e| {
            FailureCause::ExecutionError {
                phase: Phase::Synthesize,
                slice: None,
                message: format!("cannot store result: {e}"),
            }
        })?;
        Ok(vec![RESULT_FILE.to_string()])
    }
}

/// Analyze may finish the job early only when every slice says so.
pub(crate) fn finish_agreement(slices: &[SliceDone]) -> Result<bool, FailureCause> {
    let finishing = slices.iter().filter(|s| s.finish).count();
    if finishing == 0 {
        Ok(false)
    } else if finishing == slices.len() {
        Ok(true)
    } else {
        Err(FailureCause::ExecutionError {
            phase: Phase::Analyze,
            slice: None,
            message: "not all slices agreed to finish early".to_string(),
        })
    }
}

struct Worker {
    program: PathBuf,
    job_dir: PathBuf,
    slice: u32,
    prepared: Value,
    limit: Duration,
    status: StatusSender,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) -> Result<SliceDone, FailureCause> {
        let started = Instant::now();
        let slice = self.slice;
        let fail = |detail: String| FailureCause::SubprocessFailure {
            phase: Phase::Analyze,
            slice: Some(slice),
            detail,
        };

        let mut child = Command::new(&self.program)
            .arg("worker")
            .arg("--dir")
            .arg(&self.job_dir)
            .arg("--slice")
            .arg(slice.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| fail(format!("cannot start worker: {e}")))?;
        let (Some(mut stdin), Some(mut stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(fail("worker pipes unavailable".to_string()));
        };
        debug!(slice, pid = child.id(), "worker started");

        let assignment = WorkerAssignment { slice, prepared: self.prepared };
        send(&mut stdin, &assignment).await.map_err(|e| fail(e.to_string()))?;
        drop(stdin);

        let status = &self.status;
        let read = async {
            loop {
                match recv::<_, WorkerMessage>(&mut stdout).await {
                    Ok(Some(WorkerMessage::Status { event })) => status.forward(event),
                    Ok(Some(WorkerMessage::Done { result, finish, .. })) => {
                        return Ok(Some((result, finish)));
                    }
                    Ok(Some(WorkerMessage::Failed { message, .. })) => {
                        return Err(FailureCause::ExecutionError {
                            phase: Phase::Analyze,
                            slice: Some(slice),
                            message,
                        });
                    }
                    Ok(None) => return Ok(None),
                    Err(e) => return Err(fail(e.to_string())),
                }
            }
        };
        let outcome = tokio::select! {
            read = tokio::time::timeout(self.limit, read) => read.unwrap_or(Err(FailureCause::Timeout {
                phase: Some(Phase::Analyze),
                slice: Some(slice),
            })),
            _ = self.cancel.cancelled() => Err(FailureCause::Cancelled),
        };

        match outcome {
            Ok(Some((result, finish))) => {
                if wait_for(&mut child, WORKER_EXIT_GRACE).await.is_none() {
                    let _ = child.start_kill();
                }
                Ok(SliceDone { slice, result, finish, elapsed_ms: elapsed_ms(started) })
            }
            Ok(None) => {
                let status = wait_for(&mut child, WORKER_EXIT_GRACE).await;
                Err(fail(format!("worker exited without a result ({})", describe_exit(status))))
            }
            Err(cause) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Err(cause)
            }
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
