// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory index of one WorkDir, derived purely from its log.

use crate::error::StorageError;
use crate::record::{LogEntry, LogRecord};
use ax_core::{EquivalenceClasses, Fingerprint, Job, JobStatus, Options};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct WorkDirIndex {
    name: String,
    jobs: BTreeMap<u64, Job>,
    /// Every number ever allocated per fingerprint, ascending.
    by_fingerprint: HashMap<Fingerprint, Vec<u64>>,
    /// Every number ever allocated per method, ascending.
    by_method: HashMap<String, Vec<u64>>,
    /// Numbers burned without a job, with the reason.
    retired: BTreeMap<u64, String>,
    next_number: u64,
    equivalence: EquivalenceClasses,
}

impl WorkDirIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: BTreeMap::new(),
            by_fingerprint: HashMap::new(),
            by_method: HashMap::new(),
            retired: BTreeMap::new(),
            next_number: 0,
            equivalence: EquivalenceClasses::new(),
        }
    }

    /// Rebuild from log entries, failing on the first structural violation.
    pub fn replay(name: &str, entries: &[LogEntry]) -> Result<Self, StorageError> {
        let mut index = Self::new(name);
        let mut prev_seq = 0;
        for entry in entries {
            let inconsistent = |reason: String| StorageError::Inconsistent {
                workdir: name.to_string(),
                seq: entry.seq,
                reason,
            };
            if entry.seq != prev_seq + 1 {
                return Err(inconsistent(format!("expected sequence {}", prev_seq + 1)));
            }
            prev_seq = entry.seq;
            index.apply(&entry.record).map_err(inconsistent)?;
        }
        Ok(index)
    }

    /// Validate `record` against the current state without applying it.
    pub fn check(&self, record: &LogRecord) -> Result<(), String> {
        let id = record.job_id();
        if id.workdir() != self.name {
            return Err(format!("job {id} does not belong to workdir {}", self.name));
        }
        match record {
            LogRecord::Started { job } => {
                if job.id.number() != self.next_number {
                    return Err(format!(
                        "job {} started out of order, next number is {}",
                        job.id, self.next_number
                    ));
                }
                if !job.is_in_progress() {
                    return Err(format!("job {} started with status {}", job.id, job.status));
                }
                Ok(())
            }
            LogRecord::Retired { id, .. } => {
                if id.number() != self.next_number {
                    return Err(format!(
                        "job {id} retired out of order, next number is {}",
                        self.next_number
                    ));
                }
                Ok(())
            }
            LogRecord::Finished { id, .. } | LogRecord::Aborted { id, .. } => {
                match self.jobs.get(&id.number()) {
                    None => Err(format!("job {id} was never started")),
                    Some(job) if !job.is_in_progress() => {
                        Err(format!("job {id} is already {}", job.status))
                    }
                    Some(_) => Ok(()),
                }
            }
        }
    }

    /// Apply a record, validating it first.
    pub fn apply(&mut self, record: &LogRecord) -> Result<(), String> {
        self.check(record)?;
        match record {
            LogRecord::Started { job } => {
                let number = job.id.number();
                self.by_fingerprint.entry(job.fingerprint.clone()).or_default().push(number);
                self.by_method.entry(job.method.clone()).or_default().push(number);
                self.equivalence.declare(&job.method, &job.source_hash, &job.equivalent_hashes);
                self.jobs.insert(number, job.clone());
                self.next_number = number + 1;
            }
            LogRecord::Finished { id, ended_at_ms, profile, files, subjobs } => {
                if let Some(job) = self.jobs.get_mut(&id.number()) {
                    job.status = JobStatus::Finished;
                    job.ended_at_ms = Some(*ended_at_ms);
                    job.profile = Some(profile.clone());
                    job.files = files.clone();
                    job.subjobs = subjobs.clone();
                }
            }
            LogRecord::Aborted { id, ended_at_ms, cause } => {
                if let Some(job) = self.jobs.get_mut(&id.number()) {
                    job.status = JobStatus::Aborted { cause: cause.clone() };
                    job.ended_at_ms = Some(*ended_at_ms);
                }
            }
            LogRecord::Retired { id, reason } => {
                self.retired.insert(id.number(), reason.clone());
                self.next_number = id.number() + 1;
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn next_number(&self) -> u64 {
        self.next_number
    }

    /// Why `number` was retired, if it was.
    pub fn retired(&self, number: u64) -> Option<&str> {
        self.retired.get(&number).map(String::as_str)
    }

    pub fn get(&self, number: u64) -> Option<&Job> {
        self.jobs.get(&number)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Newest finished job with this fingerprint. In-progress and aborted
    /// jobs never match.
    pub fn lookup_exact(&self, fingerprint: &Fingerprint) -> Option<&Job> {
        self.by_fingerprint
            .get(fingerprint)?
            .iter()
            .rev()
            .filter_map(|n| self.jobs.get(n))
            .find(|job| job.is_finished())
    }

    /// Finished jobs of `method`, newest first.
    pub fn finished_for_method<'a>(&'a self, method: &str) -> impl Iterator<Item = &'a Job> + 'a {
        self.by_method
            .get(method)
            .into_iter()
            .flat_map(|numbers| numbers.iter().rev())
            .filter_map(|n| self.jobs.get(n))
            .filter(|job| job.is_finished())
    }

    pub fn latest(&self, method: &str) -> Option<&Job> {
        self.finished_for_method(method).next()
    }

    /// Newest finished job of `method` whose options include every
    /// key/value pair of `filter`.
    pub fn latest_matching(&self, method: &str, filter: &Options) -> Option<&Job> {
        self.finished_for_method(method)
            .find(|job| filter.iter().all(|(k, v)| job.options.get(k) == Some(v)))
    }

    pub fn in_progress(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values().filter(|job| job.is_in_progress())
    }

    pub fn equivalence(&self) -> &EquivalenceClasses {
        &self.equivalence
    }
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
