// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator side of the runtime supervisors.
//!
//! One supervisor process per runtime, spoken to over its stdin/stdout.
//! Requests carry a token; a reader task routes every reply to the waiting
//! caller and forwards status events to the [`StatusBus`].

use crate::executor::{ExecutionReport, ExecutionRequest, JobExecutor};
use crate::status::StatusBus;
use ax_core::{CatalogError, FailureCause, MethodCatalog, MethodSpec};
use ax_wire::{recv, send, ExecuteAssignment, JobOutcome, ProtocolError, SupervisorEvent, SupervisorRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("cannot start supervisor {runtime}: {source}")]
    Spawn {
        runtime: String,
        #[source]
        source: std::io::Error,
    },
    #[error("supervisor {runtime}: {source}")]
    Protocol {
        runtime: String,
        #[source]
        source: ProtocolError,
    },
    #[error("supervisor {0} is gone")]
    Closed(String),
    #[error("supervisor {0} did not answer in time")]
    Timeout(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

enum Pending {
    Describe(oneshot::Sender<Vec<MethodSpec>>),
    Execute(oneshot::Sender<JobOutcome>),
}

/// Callers waiting for a reply; `None` once the supervisor's stdout closed.
type PendingMap = Arc<Mutex<Option<HashMap<u64, Pending>>>>;

pub struct SupervisorClient {
    runtime: String,
    stdin: tokio::sync::Mutex<ChildStdin>,
    child: tokio::sync::Mutex<Child>,
    pending: PendingMap,
    next_token: AtomicU64,
}

impl SupervisorClient {
    /// Start `<program> supervisor --runtime <runtime>`.
    pub fn spawn(runtime: &str, program: &Path, bus: StatusBus) -> Result<Self, SupervisorError> {
        let mut child = Command::new(program)
            .arg("supervisor")
            .arg("--runtime")
            .arg(runtime)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn { runtime: runtime.to_string(), source })?;

        let closed = || SupervisorError::Spawn {
            runtime: runtime.to_string(),
            source: std::io::Error::other("supervisor pipes unavailable"),
        };
        let stdin = child.stdin.take().ok_or_else(closed)?;
        let stdout = child.stdout.take().ok_or_else(closed)?;
        info!(runtime, pid = child.id(), program = %program.display(), "supervisor started");

        let pending: PendingMap = Arc::new(Mutex::new(Some(HashMap::new())));
        tokio::spawn(read_events(runtime.to_string(), stdout, Arc::clone(&pending), bus));

        Ok(Self {
            runtime: runtime.to_string(),
            stdin: tokio::sync::Mutex::new(stdin),
            child: tokio::sync::Mutex::new(child),
            pending,
            next_token: AtomicU64::new(1),
        })
    }

    pub fn runtime(&self) -> &str {
        &self.runtime
    }

    async fn request(&self, request: &SupervisorRequest) -> Result<(), SupervisorError> {
        let mut stdin = self.stdin.lock().await;
        send(&mut *stdin, request)
            .await
            .map_err(|source| SupervisorError::Protocol { runtime: self.runtime.clone(), source })
    }

    fn register(&self, pending: Pending) -> Result<u64, SupervisorError> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        match self.pending.lock().as_mut() {
            Some(map) => {
                map.insert(token, pending);
                Ok(token)
            }
            None => Err(SupervisorError::Closed(self.runtime.clone())),
        }
    }

    fn forget(&self, token: u64) {
        if let Some(map) = self.pending.lock().as_mut() {
            map.remove(&token);
        }
    }

    /// Ask the supervisor for the methods it provides.
    pub async fn describe(&self, timeout: Duration) -> Result<Vec<MethodSpec>, SupervisorError> {
        let (tx, rx) = oneshot::channel();
        let token = self.register(Pending::Describe(tx))?;
        self.request(&SupervisorRequest::Describe { token }).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(methods)) => Ok(methods),
            Ok(Err(_)) => Err(SupervisorError::Closed(self.runtime.clone())),
            Err(_) => {
                self.forget(token);
                Err(SupervisorError::Timeout(self.runtime.clone()))
            }
        }
    }

    /// Run one job; returns once the supervisor reports it finished.
    ///
    /// Cancelling `cancel` asks the supervisor to terminate the job, and
    /// the reply to that is still awaited.
    pub async fn execute(&self, assignment: ExecuteAssignment, cancel: CancellationToken) -> JobOutcome {
        let died = |detail: String| JobOutcome::failed(FailureCause::SubprocessDied { detail });
        let (tx, mut rx) = oneshot::channel();
        let token = match self.register(Pending::Execute(tx)) {
            Ok(token) => token,
            Err(e) => return died(e.to_string()),
        };
        let job = assignment.job.clone();
        if let Err(e) = self.request(&SupervisorRequest::Execute { token, assignment }).await {
            self.forget(token);
            return died(e.to_string());
        }
        debug!(runtime = %self.runtime, %job, token, "dispatched");

        tokio::select! {
            outcome = &mut rx => {
                return outcome.unwrap_or_else(|_| died(format!("supervisor {} exited", self.runtime)));
            }
            _ = cancel.cancelled() => {}
        }

        info!(runtime = %self.runtime, %job, "cancelling");
        if let Err(e) = self.request(&SupervisorRequest::Cancel { token }).await {
            warn!(runtime = %self.runtime, %job, error = %e, "cancel not delivered");
        }
        rx.await.unwrap_or_else(|_| died(format!("supervisor {} exited", self.runtime)))
    }

    /// Ask the supervisor to exit; kill it after `grace`.
    pub async fn shutdown(&self, grace: Duration) -> Option<ExitStatus> {
        if let Err(e) = self.request(&SupervisorRequest::Shutdown).await {
            debug!(runtime = %self.runtime, error = %e, "shutdown not delivered");
        }
        let mut child = self.child.lock().await;
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(e)) => {
                warn!(runtime = %self.runtime, error = %e, "wait for supervisor failed");
                None
            }
            Err(_) => {
                warn!(runtime = %self.runtime, "supervisor did not exit, killing");
                let _ = child.kill().await;
                child.try_wait().ok().flatten()
            }
        }
    }
}

/// Route supervisor events until its stdout closes, then fail every caller
/// still waiting.
async fn read_events(runtime: String, mut stdout: ChildStdout, pending: PendingMap, bus: StatusBus) {
    loop {
        let event = match recv::<_, SupervisorEvent>(&mut stdout).await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(e) => {
                error!(runtime, error = %e, "bad frame from supervisor");
                break;
            }
        };
        match event {
            SupervisorEvent::Status { event, .. } => bus.publish(event),
            SupervisorEvent::Methods { token, methods } => {
                if let Some(Pending::Describe(tx)) = take(&pending, token) {
                    let _ = tx.send(methods);
                }
            }
            SupervisorEvent::Finished { token, outcome } => {
                if let Some(Pending::Execute(tx)) = take(&pending, token) {
                    let _ = tx.send(outcome);
                }
            }
        }
    }

    let waiting = pending.lock().take().unwrap_or_default();
    warn!(runtime, waiting = waiting.len(), "supervisor channel closed");
    for (_, waiter) in waiting {
        if let Pending::Execute(tx) = waiter {
            let detail = format!("supervisor {runtime} exited");
            let _ = tx.send(JobOutcome::failed(FailureCause::SubprocessDied { detail }));
        }
    }
}

fn take(pending: &PendingMap, token: u64) -> Option<Pending> {
    pending.lock().as_mut().and_then(|map| map.remove(&token))
}

/// One supervisor per runtime; executes each job on its method's runtime.
pub struct SupervisorPool {
    clients: BTreeMap<String, Arc<SupervisorClient>>,
    kill_grace: Duration,
}

impl SupervisorPool {
    /// Start a supervisor for every `(runtime, program)`.
    pub fn start<'a>(
        runtimes: impl IntoIterator<Item = (&'a str, &'a Path)>,
        bus: &StatusBus,
        kill_grace: Duration,
    ) -> Result<Self, SupervisorError> {
        let mut clients = BTreeMap::new();
        for (runtime, program) in runtimes {
            let client = SupervisorClient::spawn(runtime, program, bus.clone())?;
            clients.insert(runtime.to_string(), Arc::new(client));
        }
        Ok(Self { clients, kill_grace })
    }

    /// Build the method catalog from every supervisor's description.
    ///
    /// A method name provided by two runtimes is an error.
    pub async fn catalog(&self, timeout: Duration) -> Result<MethodCatalog, SupervisorError> {
        let mut catalog = MethodCatalog::new();
        for (runtime, client) in &self.clients {
            let methods = client.describe(timeout).await?;
            info!(runtime, methods = methods.len(), "runtime described");
            for spec in methods {
                catalog.insert(runtime, spec)?;
            }
        }
        Ok(catalog)
    }

    pub fn runtimes(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub async fn shutdown(&self) {
        for client in self.clients.values() {
            let status = client.shutdown(self.kill_grace).await;
            info!(runtime = client.runtime(), ?status, "supervisor stopped");
        }
    }
}

#[async_trait]
impl JobExecutor for SupervisorPool {
    async fn execute(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport, FailureCause> {
        let client = self.clients.get(&request.runtime).ok_or_else(|| FailureCause::SubprocessDied {
            detail: format!("no supervisor for runtime {:?}", request.runtime),
        })?;
        let assignment = ExecuteAssignment {
            job: request.job.id.clone(),
            method: request.job.method.clone(),
            job_dir: request.job_dir,
            timeouts: request.timeouts,
            kill_grace_ms: self.kill_grace.as_millis() as u64,
        };
        match client.execute(assignment, cancel).await {
            JobOutcome::Finished { profile, files, subjobs } => Ok(ExecutionReport { profile, files, subjobs }),
            JobOutcome::Failed { cause, .. } => Err(cause),
        }
    }
}
