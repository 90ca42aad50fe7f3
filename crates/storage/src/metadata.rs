// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job metadata file.
//!
//! `setup.json` in the job directory is what a job process reads to learn
//! its configuration; nothing is inherited from the parent process.

use crate::error::StorageError;
use ax_core::{Job, PhaseTimeouts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SETUP_FILE: &str = "setup.json";
pub const RESULT_FILE: &str = "result.json";
pub const SETUP_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSetup {
    #[serde(rename = "v")]
    pub version: u32,
    pub job: Job,
    pub runtime: String,
    pub slices: u32,
    /// Max concurrently running workers; all slices at once when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<u32>,
    pub timeouts: PhaseTimeouts,
    /// Directory of every WorkDir, for locating dependency outputs.
    pub workdirs: BTreeMap<String, PathBuf>,
    /// Daemon socket that prepare and synthesize submit subjobs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
}

impl JobSetup {
    /// Directory of `id` if its WorkDir is known.
    pub fn job_dir(&self, id: &ax_core::JobId) -> Option<PathBuf> {
        self.workdirs.get(id.workdir()).map(|p| p.join(id.to_string()))
    }
}

/// Write `value` as pretty JSON via a temp file and rename.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    {
        let mut file = fs::File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn write_setup(job_dir: &Path, setup: &JobSetup) -> Result<(), StorageError> {
    write_json_atomic(&job_dir.join(SETUP_FILE), setup)
}

pub fn read_setup(job_dir: &Path) -> Result<JobSetup, StorageError> {
    let bytes = fs::read(job_dir.join(SETUP_FILE))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
