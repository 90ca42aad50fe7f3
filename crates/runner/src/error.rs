// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::registry::RegistryError;
use ax_storage::StorageError;
use ax_wire::ProtocolError;
use thiserror::Error;

/// Failures of a runner process itself, as opposed to the job it runs.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("method {0} is not provided by this runtime")]
    UnknownMethod(String),
    #[error("no assignment received")]
    NoAssignment,
    #[error("assignment for slice {got}, expected slice {expected}")]
    SliceMismatch { expected: u32, got: u32 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task failed: {0}")]
    Task(String),
}
