// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ax-engine: resolution, caching decisions and dispatch of job trees.

mod executor;
mod explain;
mod locks;
mod orchestrator;
mod resolve;
mod status;
mod supervisor;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use executor::{ExecutionReport, ExecutionRequest, JobExecutor};
pub use locks::FingerprintLocks;
pub use orchestrator::{NodeFailure, Orchestrator, OrchestratorConfig, SubmitError, SubmitOutcome, MAX_SUBJOB_DEPTH};
pub use resolve::{resolve, Child, ChildBinding, DependencyNode, DependencyTree, NodeId, ResolveError};
pub use status::StatusBus;
pub use supervisor::{SupervisorClient, SupervisorError, SupervisorPool};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakeExecutor};
