// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for runner unit tests.

use crate::method::{MethodContext, StatusSender};
use ax_core::{Job, JobId, PhaseTimeouts, StatusEvent, Submission};
use ax_storage::{write_json_atomic, JobSetup, RESULT_FILE, SETUP_VERSION};
use ax_wire::{recv, send, Request, Response};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A setup for `job` whose only WorkDir `test` lives at `<root>/test`.
pub fn setup(root: &Path, job: Job, slices: u32) -> JobSetup {
    JobSetup {
        version: SETUP_VERSION,
        job,
        runtime: "default".to_string(),
        slices,
        concurrency: None,
        timeouts: PhaseTimeouts::uniform(Duration::from_secs(10)),
        workdirs: BTreeMap::from([("test".to_string(), root.join("test"))]),
        socket: None,
    }
}

/// A context plus the receiving end of its status events.
pub fn context(
    root: &Path,
    job: Job,
    slices: u32,
) -> (MethodContext, CancellationToken, mpsc::UnboundedReceiver<StatusEvent>) {
    let setup = setup(root, job, slices);
    let dir = setup.job_dir(&setup.job.id).unwrap_or_else(|| root.to_path_buf());
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let status = StatusSender::new(setup.job.id.clone(), tx);
    (MethodContext::new(&setup, &dir, cancel.clone(), status), cancel, rx)
}

/// Store `value` as the result of job `test-<n>`.
pub fn store_result(root: &Path, n: u64, value: &Value) -> JobId {
    let id = JobId::new("test", n);
    write_json_atomic(&root.join("test").join(id.to_string()).join(RESULT_FILE), value).unwrap();
    id
}

/// A context whose job may submit subjobs to `socket`.
pub fn context_with_socket(root: &Path, job: Job, socket: &Path) -> (MethodContext, CancellationToken) {
    let mut setup = setup(root, job, 1);
    setup.socket = Some(socket.to_path_buf());
    let dir = setup.job_dir(&setup.job.id).unwrap_or_else(|| root.to_path_buf());
    let cancel = CancellationToken::new();
    let status = StatusSender::discard(setup.job.id.clone());
    (MethodContext::new(&setup, &dir, cancel.clone(), status), cancel)
}

/// Serve submits on `socket`, answering the n-th with `answer(n, submission)`.
/// Returns every submission received so far.
pub fn fake_daemon<F>(socket: &Path, answer: F) -> Arc<Mutex<Vec<Submission>>>
where
    F: Fn(usize, &Submission) -> Response + Send + Sync + 'static,
{
    let listener = UnixListener::bind(socket).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let Ok(Some(Request::Submit { submission })) = recv::<_, Request>(&mut stream).await else {
                continue;
            };
            let n = {
                let mut log = log.lock();
                log.push(submission.clone());
                log.len() - 1
            };
            let _ = send(&mut stream, &answer(n, &submission)).await;
        }
    });
    seen
}
