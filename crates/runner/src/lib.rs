// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ax-runner: the process side of job execution.
//!
//! Process tree per runtime:
//!
//! ```text
//! supervisor (axd supervisor)      one per runtime, talks to the orchestrator
//! └── job process (axd job)        one per job, leads its own process group
//!     └── worker (axd worker)      one per slice, analyze phase only
//! ```

pub mod builtin;
mod error;
mod job;
mod method;
mod output;
mod process;
mod registry;
mod subjob;
mod supervisor;
mod worker;

pub use error::RunnerError;
pub use job::run_job;
pub use method::{Flow, Method, MethodContext, MethodError, StatusSender};
pub use process::{cancel_on_sigterm, signal_group};
pub use registry::{MethodRegistry, RegistryError};
pub use subjob::Subjobs;
pub use supervisor::serve as serve_supervisor;
pub use worker::run_worker;

#[cfg(test)]
mod test_helpers;
