// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted executor for tests.

#![cfg_attr(coverage_nightly, coverage(off))]

use crate::executor::{ExecutionReport, ExecutionRequest, JobExecutor};
use ax_core::{FailureCause, JobId, Profile};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type Hook = Arc<dyn Fn(&JobId) + Send + Sync>;

/// Recorded execution
#[derive(Debug, Clone)]
pub struct FakeCall {
    pub job: JobId,
    pub method: String,
    pub request: ExecutionRequest,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<FakeCall>,
    failures: HashMap<String, VecDeque<FailureCause>>,
    delays: HashMap<String, Duration>,
    hang: HashMap<String, bool>,
    panics: HashMap<String, bool>,
    hooks: HashMap<String, Hook>,
    subjobs: HashMap<String, Vec<JobId>>,
    running: usize,
    max_running: usize,
}

/// Executor that runs nothing and answers per method as scripted.
///
/// Unscripted methods finish immediately with a one-millisecond profile.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next execution of `method` with `cause`.
    pub fn fail_next(&self, method: &str, cause: FailureCause) {
        self.inner.lock().failures.entry(method.to_string()).or_default().push_back(cause);
    }

    /// Make every execution of `method` take `delay`.
    pub fn delay(&self, method: &str, delay: Duration) {
        self.inner.lock().delays.insert(method.to_string(), delay);
    }

    /// Make every execution of `method` run until cancelled.
    pub fn hang(&self, method: &str) {
        self.inner.lock().hang.insert(method.to_string(), true);
    }

    /// Make the next execution of `method` panic.
    pub fn panic_next(&self, method: &str) {
        self.inner.lock().panics.insert(method.to_string(), true);
    }

    /// Run `hook` with the job id just before an execution of `method`
    /// reports success.
    pub fn before_success(&self, method: &str, hook: impl Fn(&JobId) + Send + Sync + 'static) {
        self.inner.lock().hooks.insert(method.to_string(), Arc::new(hook));
    }

    /// Report `subjobs` from every successful execution of `method`.
    pub fn report_subjobs(&self, method: &str, subjobs: Vec<JobId>) {
        self.inner.lock().subjobs.insert(method.to_string(), subjobs);
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.inner.lock().calls.clone()
    }

    pub fn calls_for(&self, method: &str) -> usize {
        self.inner.lock().calls.iter().filter(|c| c.method == method).count()
    }

    /// Highest number of executions that were running at once.
    pub fn max_running(&self) -> usize {
        self.inner.lock().max_running
    }
}

#[async_trait]
impl JobExecutor for FakeExecutor {
    async fn execute(
        &self,
        request: ExecutionRequest,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport, FailureCause> {
        let method = request.job.method.clone();
        let job = request.job.id.clone();
        let (delay, hang, panics) = {
            let mut state = self.inner.lock();
            state.calls.push(FakeCall { job: job.clone(), method: method.clone(), request });
            state.running += 1;
            state.max_running = state.max_running.max(state.running);
            (
                state.delays.get(&method).copied().unwrap_or_default(),
                state.hang.get(&method).copied().unwrap_or(false),
                state.panics.remove(&method).unwrap_or(false),
            )
        };
        if panics {
            self.inner.lock().running -= 1;
            scripted_panic(&method);
        }

        let finished = if hang {
            cancel.cancelled().await;
            false
        } else {
            tokio::select! {
                _ = tokio::time::sleep(delay) => true,
                _ = cancel.cancelled() => false,
            }
        };

        let (hook, subjobs) = {
            let mut state = self.inner.lock();
            state.running -= 1;
            if !finished {
                return Err(FailureCause::Cancelled);
            }
            if let Some(cause) = state.failures.get_mut(&method).and_then(VecDeque::pop_front) {
                return Err(cause);
            }
            (state.hooks.get(&method).cloned(), state.subjobs.get(&method).cloned().unwrap_or_default())
        };
        if let Some(hook) = hook {
            hook(&job);
        }
        Ok(ExecutionReport {
            profile: Profile { total_ms: 1, ..Profile::default() },
            files: vec!["result.json".to_string()],
            subjobs,
        })
    }
}

#[allow(clippy::panic)]
fn scripted_panic(method: &str) -> ! {
    panic!("scripted panic in {method}")
}
