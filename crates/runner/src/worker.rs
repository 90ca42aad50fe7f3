// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An analyze worker: one slice, one process.

use crate::method::{MethodContext, StatusSender};
use crate::output::pump;
use crate::process::{cancel_on_sigterm, panic_message};
use crate::registry::MethodRegistry;
use crate::RunnerError;
use ax_core::{Phase, StatusKind};
use ax_storage::read_setup;
use ax_wire::{recv, WorkerAssignment, WorkerMessage};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Read the assignment from stdin, analyze the slice, report on stdout.
pub async fn run_worker(registry: &MethodRegistry, job_dir: &Path, slice: u32) -> Result<(), RunnerError> {
    let setup = read_setup(job_dir)?;
    let method = registry
        .get(&setup.job.method)
        .ok_or_else(|| RunnerError::UnknownMethod(setup.job.method.clone()))?;
    let assignment: WorkerAssignment =
        recv(&mut tokio::io::stdin()).await?.ok_or(RunnerError::NoAssignment)?;
    if assignment.slice != slice {
        return Err(RunnerError::SliceMismatch { expected: slice, got: assignment.slice });
    }

    let cancel = CancellationToken::new();
    cancel_on_sigterm(cancel.clone())?;
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (last_tx, last_rx) = oneshot::channel();
    let writer = tokio::spawn(pump(tokio::io::stdout(), status_rx, last_rx, |event| {
        WorkerMessage::Status { event }
    }));

    let status = StatusSender::new(setup.job.id.clone(), status_tx)
        .child(&setup.job.method)
        .child(Phase::Analyze.to_string())
        .child(format!("slice {slice}"));
    let ctx = MethodContext::new(&setup, job_dir, cancel, status).with_phase(Phase::Analyze);
    ctx.status().send(StatusKind::Enter);
    debug!(job = %setup.job.id, slice, "analyzing");

    let task_ctx = ctx.clone();
    let prepared = assignment.prepared;
    let joined = tokio::task::spawn_blocking(move || method.analyze(&task_ctx, slice, &prepared)).await;
    let message = match joined {
        Ok(Ok(flow)) => WorkerMessage::Done { slice, finish: flow.is_finish(), result: flow.into_value() },
        Ok(Err(e)) => WorkerMessage::Failed { slice, message: e.to_string() },
        Err(e) => WorkerMessage::Failed { slice, message: panic_message(e) },
    };
    ctx.status().send(StatusKind::Leave);

    let _ = last_tx.send(message);
    writer.await.map_err(|e| RunnerError::Task(e.to_string()))??;
    Ok(())
}
