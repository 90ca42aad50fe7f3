// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime supervisor: owns the job processes of one runtime.
//!
//! Requests arrive as frames on stdin, events leave as frames on stdout.
//! Every `Execute` gets its own task and its own job process, which leads
//! a fresh process group so cancellation reaches its workers too.

use crate::process::{describe_exit, signal_group, wait_for};
use crate::registry::MethodRegistry;
use crate::RunnerError;
use ax_core::FailureCause;
use ax_wire::{
    recv, send, ExecuteAssignment, JobMessage, JobOutcome, SupervisorEvent, SupervisorRequest,
};
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Serve requests from `input` until `Shutdown` or end of input.
pub async fn serve<R, W>(
    registry: Arc<MethodRegistry>,
    program: PathBuf,
    mut input: R,
    output: W,
) -> Result<(), RunnerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (events, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_events(output, rx));
    let running: Arc<Mutex<HashMap<u64, CancellationToken>>> = Arc::default();
    let mut tasks = JoinSet::new();

    let mut failure = None;

    loop {
        let request = match recv::<_, SupervisorRequest>(&mut input).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                info!("orchestrator closed the channel");
                break;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        };
        while tasks.try_join_next().is_some() {}
        match request {
            SupervisorRequest::Describe { token } => {
                let _ = events.send(SupervisorEvent::Methods { token, methods: registry.specs() });
            }
            SupervisorRequest::Execute { token, assignment } => {
                let cancel = CancellationToken::new();
                running.lock().insert(token, cancel.clone());
                let program = program.clone();
                let events = events.clone();
                let running = Arc::clone(&running);
                tasks.spawn(async move {
                    let outcome = execute(&program, token, &assignment, cancel, &events).await;
                    running.lock().remove(&token);
                    let _ = events.send(SupervisorEvent::Finished { token, outcome });
                });
            }
            SupervisorRequest::Cancel { token } => match running.lock().get(&token) {
                Some(cancel) => cancel.cancel(),
                None => debug!(token, "cancel for unknown execution"),
            },
            SupervisorRequest::Shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    for cancel in running.lock().values() {
        cancel.cancel();
    }
    while tasks.join_next().await.is_some() {}
    drop(events);
    writer.await.map_err(|e| RunnerError::Task(e.to_string()))??;
    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

async fn write_events<W: AsyncWrite + Unpin>(
    mut output: W,
    mut rx: mpsc::UnboundedReceiver<SupervisorEvent>,
) -> Result<(), RunnerError> {
    while let Some(event) = rx.recv().await {
        send(&mut output, &event).await?;
    }
    Ok(())
}

/// Run one job process to completion, cancellation or timeout.
async fn execute(
    program: &Path,
    token: u64,
    assignment: &ExecuteAssignment,
    cancel: CancellationToken,
    events: &mpsc::UnboundedSender<SupervisorEvent>,
) -> JobOutcome {
    let job = &assignment.job;
    let grace = Duration::from_millis(assignment.kill_grace_ms);
    let mut child = match Command::new(program)
        .arg("job")
        .arg("--dir")
        .arg(&assignment.job_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .process_group(0)
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(%job, error = %e, "cannot start job process");
            let detail = format!("cannot start job process: {e}");
            return JobOutcome::failed(FailureCause::SubprocessDied { detail });
        }
    };
    let Some(pgid) = child.id() else {
        let detail = "job process exited before it could be tracked".to_string();
        return JobOutcome::failed(FailureCause::SubprocessDied { detail });
    };
    let Some(mut stdout) = child.stdout.take() else {
        signal_group(pgid, Signal::SIGKILL);
        let detail = "job process stdout unavailable".to_string();
        return JobOutcome::failed(FailureCause::SubprocessDied { detail });
    };
    info!(%job, method = %assignment.method, pid = pgid, "job process started");

    let deadline = tokio::time::sleep(assignment.timeouts.total() + grace);
    tokio::pin!(deadline);
    let mut result: Option<JobOutcome> = None;
    let mut interrupted: Option<FailureCause> = None;

    loop {
        tokio::select! {
            frame = recv::<_, JobMessage>(&mut stdout) => match frame {
                Ok(Some(JobMessage::Status(event))) => {
                    let _ = events.send(SupervisorEvent::Status { token, event });
                }
                Ok(Some(JobMessage::Result(outcome))) => result = Some(outcome),
                Ok(None) => break,
                Err(e) => {
                    warn!(%job, error = %e, "bad frame from job process");
                    break;
                }
            },
            _ = cancel.cancelled() => {
                info!(%job, "terminating job process group");
                signal_group(pgid, Signal::SIGTERM);
                interrupted = Some(FailureCause::Cancelled);
                break;
            }
            _ = &mut deadline => {
                warn!(%job, "job exceeded its time bound");
                interrupted = Some(FailureCause::Timeout { phase: None, slice: None });
                break;
            }
        }
    }

    let status = match interrupted {
        Some(FailureCause::Cancelled) => match wait_for(&mut child, grace).await {
            Some(status) => Some(status),
            None => {
                warn!(%job, "job process ignored SIGTERM, killing");
                signal_group(pgid, Signal::SIGKILL);
                wait_for(&mut child, grace).await
            }
        },
        Some(_) => {
            signal_group(pgid, Signal::SIGKILL);
            wait_for(&mut child, grace).await
        }
        None => wait_for(&mut child, grace).await,
    };
    // No worker outlives its job.
    signal_group(pgid, Signal::SIGKILL);
    debug!(%job, status = %describe_exit(status), "job process reaped");

    match (result, interrupted) {
        (Some(outcome), None) => outcome,
        (_, Some(cause)) => JobOutcome::failed(cause),
        (None, None) => {
            let detail = format!("job process exited without a result ({})", describe_exit(status));
            JobOutcome::failed(FailureCause::SubprocessDied { detail })
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
