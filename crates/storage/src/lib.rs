// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ax-storage: the Job Database.
//!
//! Each WorkDir owns an append-only `jobs.log`. The in-memory index is
//! nothing but a replay of that log, updated only after an append has
//! reached the disk.

mod backup;
mod db;
mod error;
mod index;
mod log;
mod metadata;
mod record;
mod workdir;

pub use db::{JobDb, WhyCandidate};
pub use error::StorageError;
pub use index::WorkDirIndex;
pub use log::{JobLog, LOG_FILE};
pub use metadata::{
    read_setup, write_json_atomic, write_setup, JobSetup, RESULT_FILE, SETUP_FILE, SETUP_VERSION,
};
pub use record::{Completion, LogEntry, LogRecord, NewJob};
pub use workdir::{RepairReport, WorkDir};
