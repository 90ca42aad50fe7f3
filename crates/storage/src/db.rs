// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Job Database: every WorkDir the orchestrator owns.
//!
//! Each WorkDir sits behind its own mutex, which is the single-writer
//! discipline for its log. A WorkDir whose log does not replay is kept in a
//! broken state: every operation on it fails until it is repaired, while the
//! other WorkDirs keep working.

use crate::error::StorageError;
use crate::record::{Completion, NewJob};
use crate::workdir::{RepairReport, WorkDir};
use ax_core::{EquivalenceClasses, FailureCause, Fingerprint, Job, JobId, Options};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A prior job that almost matches a request.
#[derive(Debug, Clone, PartialEq)]
pub struct WhyCandidate {
    pub job: Job,
    /// Option keys whose values differ from the request.
    pub differing: Vec<String>,
}

enum Slot {
    Open(WorkDir),
    Broken { seq: u64, reason: String },
}

struct Entry {
    path: PathBuf,
    slot: Mutex<Slot>,
}

pub struct JobDb {
    workdirs: BTreeMap<String, Entry>,
}

impl JobDb {
    /// Open every WorkDir. Ones that fail to replay are kept but broken.
    pub fn open(workdirs: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        let mut map = BTreeMap::new();
        for (name, path) in workdirs {
            let slot = match WorkDir::open(&name, &path) {
                Ok(wd) => Slot::Open(wd),
                Err(e) => {
                    error!(workdir = %name, error = %e, "workdir unusable until repaired");
                    let seq = match &e {
                        StorageError::Inconsistent { seq, .. } => *seq,
                        _ => 0,
                    };
                    Slot::Broken { seq, reason: e.to_string() }
                }
            };
            map.insert(name, Entry { path, slot: Mutex::new(slot) });
        }
        Self { workdirs: map }
    }

    pub fn workdir_names(&self) -> impl Iterator<Item = &str> {
        self.workdirs.keys().map(String::as_str)
    }

    pub fn workdir_paths(&self) -> BTreeMap<String, PathBuf> {
        self.workdirs.iter().map(|(name, e)| (name.clone(), e.path.clone())).collect()
    }

    pub fn workdir_path(&self, workdir: &str) -> Option<&Path> {
        self.workdirs.get(workdir).map(|e| e.path.as_path())
    }

    pub fn job_dir(&self, id: &JobId) -> Option<PathBuf> {
        self.workdir_path(id.workdir()).map(|p| p.join(id.to_string()))
    }

    /// WorkDirs that failed to open, with the reason.
    pub fn broken(&self) -> Vec<(String, String)> {
        self.workdirs
            .iter()
            .filter_map(|(name, e)| match &*e.slot.lock() {
                Slot::Broken { reason, .. } => Some((name.clone(), reason.clone())),
                Slot::Open(_) => None,
            })
            .collect()
    }

    fn with<T>(
        &self,
        workdir: &str,
        f: impl FnOnce(&mut WorkDir) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let entry =
            self.workdirs.get(workdir).ok_or_else(|| StorageError::UnknownWorkDir(workdir.to_string()))?;
        let mut slot = entry.slot.lock();
        match &mut *slot {
            Slot::Open(wd) => f(wd),
            Slot::Broken { seq, reason } => Err(StorageError::Inconsistent {
                workdir: workdir.to_string(),
                seq: *seq,
                reason: reason.clone(),
            }),
        }
    }

    /// Newest finished job with `fingerprint`.
    pub fn lookup_exact(&self, workdir: &str, fingerprint: &Fingerprint) -> Result<Option<Job>, StorageError> {
        self.with(workdir, |wd| Ok(wd.index().lookup_exact(fingerprint).cloned()))
    }

    /// First hit among `fingerprints`, tried in order.
    pub fn lookup_any(&self, workdir: &str, fingerprints: &[Fingerprint]) -> Result<Option<Job>, StorageError> {
        self.with(workdir, |wd| {
            Ok(fingerprints.iter().find_map(|fp| wd.index().lookup_exact(fp)).cloned())
        })
    }

    /// Newest finished job of `method`, whatever its options.
    pub fn latest(&self, workdir: &str, method: &str) -> Result<Option<Job>, StorageError> {
        self.with(workdir, |wd| Ok(wd.index().latest(method).cloned()))
    }

    pub fn latest_matching(
        &self,
        workdir: &str,
        method: &str,
        filter: &Options,
    ) -> Result<Option<Job>, StorageError> {
        self.with(workdir, |wd| Ok(wd.index().latest_matching(method, filter).cloned()))
    }

    pub fn get(&self, id: &JobId) -> Result<Option<Job>, StorageError> {
        self.with(id.workdir(), |wd| Ok(wd.index().get(id.number()).cloned()))
    }

    /// Allocate the next number in `workdir` and log the job as started.
    pub fn begin(&self, workdir: &str, new: NewJob) -> Result<Job, StorageError> {
        self.with(workdir, |wd| wd.begin(new))
    }

    /// Mark a started job finished; from now on it is a cache hit.
    pub fn record(&self, id: &JobId, completion: Completion) -> Result<Job, StorageError> {
        self.with(id.workdir(), |wd| {
            wd.finish(id, completion)
        })
    }

    /// Tombstone a started job.
    pub fn mark_aborted(&self, id: &JobId, ended_at_ms: u64, cause: FailureCause) -> Result<Job, StorageError> {
        self.with(id.workdir(), |wd| wd.abort(id, ended_at_ms, cause))
    }

    /// Tombstone every job left in progress by a previous orchestrator.
    pub fn abort_interrupted(&self, now_ms: u64) -> Result<Vec<JobId>, StorageError> {
        let mut aborted = Vec::new();
        for name in self.workdirs.keys() {
            let ids = match self.with(name, |wd| interrupt_all(wd, now_ms)) {
                Ok(ids) => ids,
                Err(StorageError::Inconsistent { .. }) => continue,
                Err(e) => return Err(e),
            };
            aborted.extend(ids);
        }
        Ok(aborted)
    }

    /// Finished jobs of `method` built under one of `hashes`, closest to
    /// `options` first (fewest differing keys, then newest).
    pub fn closest(
        &self,
        workdir: &str,
        method: &str,
        hashes: &[String],
        options: &Options,
        limit: usize,
    ) -> Result<Vec<WhyCandidate>, StorageError> {
        self.with(workdir, |wd| {
            let mut candidates: Vec<WhyCandidate> = wd
                .index()
                .finished_for_method(method)
                .filter(|job| hashes.contains(&job.source_hash))
                .map(|job| WhyCandidate { differing: differing_keys(options, &job.options), job: job.clone() })
                .collect();
            candidates.sort_by_key(|c| c.differing.len());
            candidates.truncate(limit);
            Ok(candidates)
        })
    }

    /// Equivalence declarations recorded by every open WorkDir.
    pub fn equivalence(&self) -> EquivalenceClasses {
        let mut classes = EquivalenceClasses::new();
        for entry in self.workdirs.values() {
            if let Slot::Open(wd) = &*entry.slot.lock() {
                classes.merge(wd.index().equivalence());
            }
        }
        classes
    }

    /// Rebuild a WorkDir from the salvageable part of its log.
    pub fn repair(&self, workdir: &str, now_ms: u64) -> Result<RepairReport, StorageError> {
        let entry =
            self.workdirs.get(workdir).ok_or_else(|| StorageError::UnknownWorkDir(workdir.to_string()))?;
        let mut slot = entry.slot.lock();
        let (mut wd, report) = WorkDir::repair(workdir, &entry.path)?;
        let interrupted = interrupt_all(&mut wd, now_ms)?;
        info!(
            workdir,
            kept = report.kept,
            dropped = report.dropped.len(),
            retired = report.retired,
            interrupted = interrupted.len(),
            "workdir repaired"
        );
        *slot = Slot::Open(wd);
        Ok(report)
    }

    /// Flush every log to disk.
    pub fn close(&self) -> Result<(), StorageError> {
        for entry in self.workdirs.values() {
            if let Slot::Open(wd) = &*entry.slot.lock() {
                wd.sync()?;
            }
        }
        Ok(())
    }
}

fn interrupt_all(wd: &mut WorkDir, now_ms: u64) -> Result<Vec<JobId>, StorageError> {
    let ids: Vec<JobId> = wd.index().in_progress().map(|job| job.id.clone()).collect();
    for id in &ids {
        warn!(job = %id, "job was in progress at startup, marking aborted");
        wd.abort(id, now_ms, FailureCause::Interrupted)?;
    }
    Ok(ids)
}

fn differing_keys(wanted: &Options, have: &Options) -> Vec<String> {
    let mut keys: Vec<String> = wanted
        .keys()
        .chain(have.keys())
        .filter(|k| wanted.get(*k) != have.get(*k))
        .cloned()
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
