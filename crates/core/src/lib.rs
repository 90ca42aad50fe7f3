// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ax-core: shared vocabulary for the job engine.
//!
//! Everything here is pure data plus pure functions. Nothing in this crate
//! touches the filesystem or spawns processes.

pub mod macros;

pub mod clock;
pub mod equivalence;
pub mod error;
pub mod fingerprint;
pub mod id;
pub mod job;
pub mod method;
pub mod options;
pub mod request;
pub mod status;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use equivalence::EquivalenceClasses;
pub use error::{ErrorKind, FailureCause};
pub use fingerprint::{fingerprint, source_hash, DependencyDigest, DependencyKind, Fingerprint};
pub use id::{validate_workdir_name, IdError, JobId};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{DatasetRef, Job, JobStatus, Profile};
pub use method::{CatalogEntry, CatalogError, MethodCatalog, MethodSpec, Phase, PhaseTimeouts, SlotArity, SlotSpec};
pub use options::{OptionSchema, OptionSpec, OptionType, Options, OptionsError};
pub use request::{Binding, JobInput, JobRequest, Submission};
pub use status::{NodeState, StatusEvent, StatusKind};
