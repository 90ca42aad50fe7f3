// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One WorkDir: its log, its index, and its job directories.

use crate::backup::rotate_bak_path;
use crate::error::StorageError;
use crate::index::WorkDirIndex;
use crate::log::{JobLog, LOG_FILE};
use crate::record::{Completion, LogRecord, NewJob};
use ax_core::{FailureCause, Job, JobId};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a repair kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub kept: usize,
    pub dropped: Vec<String>,
    /// Numbers burned so they are never reissued.
    pub retired: usize,
    pub backup: Option<PathBuf>,
}

pub struct WorkDir {
    path: PathBuf,
    log: JobLog,
    index: WorkDirIndex,
}

impl WorkDir {
    /// Open the WorkDir at `path`, replaying its log.
    ///
    /// Job directories numbered past the end of the log (left behind by a
    /// truncated tail) are retired so their numbers are never reissued.
    pub fn open(name: &str, path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let (log, entries) = JobLog::open(&path.join(LOG_FILE))?;
        let index = WorkDirIndex::replay(name, &entries)?;
        let mut wd = Self { path: path.to_path_buf(), log, index };
        let orphans = wd.retire_orphan_dirs()?;
        if orphans > 0 {
            warn!(workdir = name, retired = orphans, "retired numbers of job directories missing from the log");
        }
        info!(
            workdir = name,
            jobs = wd.index.len(),
            next = wd.index.next_number(),
            "replayed job log"
        );
        Ok(wd)
    }

    /// Rebuild a WorkDir whose log does not replay cleanly.
    ///
    /// Records are applied in order and the ones that violate the log's
    /// structure are dropped. Every number the log or the directory
    /// mentions stays allocated: gaps and numbers whose records were
    /// dropped are retired. The original log is kept as a backup.
    pub fn repair(name: &str, path: &Path) -> Result<(Self, RepairReport), StorageError> {
        std::fs::create_dir_all(path)?;
        let log_path = path.join(LOG_FILE);
        let (_, entries) = JobLog::open(&log_path)?;

        let mut index = WorkDirIndex::new(name);
        let mut kept = Vec::new();
        let mut report = RepairReport::default();
        for entry in entries {
            let id = entry.record.job_id().clone();
            let ours = id.workdir() == name;
            if ours && id.number() > index.next_number() {
                for number in index.next_number()..id.number() {
                    let reason = format!("no start record before seq {}", entry.seq);
                    retire(&mut index, &mut kept, JobId::new(name, number), reason);
                    report.retired += 1;
                }
            }
            if let Err(reason) = index.apply(&entry.record) {
                warn!(workdir = name, seq = entry.seq, %reason, "dropping log record");
                if ours && id.number() == index.next_number() {
                    retire(&mut index, &mut kept, id, format!("dropped record: {reason}"));
                    report.retired += 1;
                }
                report.dropped.push(format!("seq {}: {reason}", entry.seq));
                continue;
            }
            kept.push(entry.record);
            report.kept += 1;
        }

        if log_path.exists() {
            let bak = rotate_bak_path(&log_path);
            std::fs::copy(&log_path, &bak)?;
            report.backup = Some(bak);
        }
        let (log, entries) = JobLog::rewrite(&log_path, &kept)?;
        let index = WorkDirIndex::replay(name, &entries)?;
        let mut wd = Self { path: path.to_path_buf(), log, index };
        report.retired += wd.retire_orphan_dirs()?;
        Ok((wd, report))
    }

    /// Retire every number up to the highest `<name>-<n>` directory that
    /// the log does not cover. Returns how many numbers were retired.
    fn retire_orphan_dirs(&mut self) -> Result<usize, StorageError> {
        let mut highest = None;
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().and_then(|s| s.parse::<JobId>().ok()) else {
                continue;
            };
            if id.workdir() == self.name() && id.number() >= self.index.next_number() {
                highest = highest.max(Some(id.number()));
            }
        }
        let Some(highest) = highest else {
            return Ok(0);
        };
        let first = self.index.next_number();
        for number in first..=highest {
            let id = JobId::new(self.name(), number);
            self.commit(LogRecord::Retired { id, reason: "job directory exists on disk".to_string() })?;
        }
        Ok((highest + 1 - first) as usize)
    }

    pub fn name(&self) -> &str {
        self.index.name()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn index(&self) -> &WorkDirIndex {
        &self.index
    }

    /// Directory holding one job's metadata and outputs.
    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.path.join(id.to_string())
    }

    /// Allocate the next number and log the job as started.
    pub fn begin(&mut self, new: NewJob) -> Result<Job, StorageError> {
        let id = JobId::new(self.name(), self.index.next_number());
        let job = new.into_job(id);
        self.commit(LogRecord::Started { job: job.clone() })?;
        Ok(job)
    }

    pub fn finish(&mut self, id: &JobId, completion: Completion) -> Result<Job, StorageError> {
        let Completion { ended_at_ms, profile, files, subjobs } = completion;
        self.commit(LogRecord::Finished { id: id.clone(), ended_at_ms, profile, files, subjobs })?;
        self.committed(id)
    }

    pub fn abort(&mut self, id: &JobId, ended_at_ms: u64, cause: FailureCause) -> Result<Job, StorageError> {
        self.commit(LogRecord::Aborted { id: id.clone(), ended_at_ms, cause })?;
        self.committed(id)
    }

    pub fn sync(&self) -> Result<(), StorageError> {
        self.log.sync()
    }

    /// Validate, append durably, then update the index.
    fn commit(&mut self, record: LogRecord) -> Result<(), StorageError> {
        let rejected = |reason: String| StorageError::Rejected { workdir: self.name().to_string(), reason };
        self.index.check(&record).map_err(rejected)?;
        self.log.append(&record)?;
        self.index.apply(&record).map_err(|reason| StorageError::Rejected {
            workdir: self.index.name().to_string(),
            reason,
        })
    }

    fn committed(&self, id: &JobId) -> Result<Job, StorageError> {
        self.index.get(id.number()).cloned().ok_or_else(|| StorageError::UnknownJob(id.clone()))
    }
}

fn retire(index: &mut WorkDirIndex, kept: &mut Vec<LogRecord>, id: JobId, reason: String) {
    let record = LogRecord::Retired { id, reason };
    // In order by construction: `id` is always the index's next number.
    if index.apply(&record).is_ok() {
        kept.push(record);
    }
}

#[cfg(test)]
#[path = "workdir_tests.rs"]
mod tests;
