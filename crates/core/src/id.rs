// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity: a WorkDir name plus a sequence number.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid job id {0:?}: expected <workdir>-<number>")]
    Malformed(String),
    #[error("invalid workdir name {0:?}")]
    BadWorkDir(String),
}

/// Identity of one job: `<workdir>-<number>`.
///
/// Numbers are allocated by the owning WorkDir, start at 0, and are never
/// reused. Ordering is by workdir, then number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId {
    workdir: String,
    number: u64,
}

impl JobId {
    pub fn new(workdir: impl Into<String>, number: u64) -> Self {
        Self { workdir: workdir.into(), number }
    }

    pub fn workdir(&self) -> &str {
        &self.workdir
    }

    pub fn number(&self) -> u64 {
        self.number
    }
}

/// Check that a WorkDir name can appear in a job id and as a directory name.
pub fn validate_workdir_name(name: &str) -> Result<(), IdError> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(IdError::BadWorkDir(name.to_string()))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.workdir, self.number)
    }
}

impl FromStr for JobId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdError::Malformed(s.to_string());
        let (workdir, number) = s.rsplit_once('-').ok_or_else(malformed)?;
        if workdir.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let number = number.parse::<u64>().map_err(|_| malformed())?;
        validate_workdir_name(workdir).map_err(|_| malformed())?;
        Ok(Self::new(workdir, number))
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
