// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSON-lines job log.
//!
//! Every append is one `write_all` of a complete line followed by
//! `sync_data`, so a record is either fully on disk or it is a torn tail.
//! On open, the first line that is not a complete, parseable entry ends the
//! log: the file is backed up and truncated there.

use crate::backup::rotate_bak_path;
use crate::error::StorageError;
use crate::record::{LogEntry, LogRecord};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LOG_FILE: &str = "jobs.log";

#[derive(Serialize)]
struct EntryRef<'a> {
    seq: u64,
    record: &'a LogRecord,
}

pub struct JobLog {
    path: PathBuf,
    file: File,
    /// Length of the intact prefix; a failed append is truncated back to it.
    len: u64,
    write_seq: u64,
}

impl JobLog {
    /// Open or create the log and return every intact entry in order.
    pub fn open(path: &Path) -> Result<(Self, Vec<LogEntry>), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let (entries, valid_len) = parse_entries(&bytes);
        if valid_len < bytes.len() {
            let bak = rotate_bak_path(path);
            fs::copy(path, &bak)?;
            warn!(
                path = %path.display(),
                kept = entries.len(),
                dropped_bytes = bytes.len() - valid_len,
                backup = %bak.display(),
                "job log has a torn or corrupt tail, truncating",
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0);
        let log = Self { path: path.to_path_buf(), file, len: valid_len as u64, write_seq };
        Ok((log, entries))
    }

    /// Replace the log at `path` with `records`, numbered from 1.
    ///
    /// The new content is written beside the old file and renamed over it.
    pub fn rewrite(path: &Path, records: &[LogRecord]) -> Result<(Self, Vec<LogEntry>), StorageError> {
        let tmp = path.with_extension("log.tmp");
        {
            let mut file = File::create(&tmp)?;
            for (i, record) in records.iter().enumerate() {
                let mut line = serde_json::to_vec(&EntryRef { seq: i as u64 + 1, record })?;
                line.push(b'\n');
                file.write_all(&line)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Self::open(path)
    }

    /// Durably append one record and return its sequence number.
    pub fn append(&mut self, record: &LogRecord) -> Result<u64, StorageError> {
        let seq = self.write_seq + 1;
        let mut line = serde_json::to_vec(&EntryRef { seq, record })?;
        line.push(b'\n');

        if let Err(e) = self.write_durable(&line) {
            // Never leave a partial line for the next append to extend.
            let _ = self.file.set_len(self.len);
            return Err(e.into());
        }
        self.len += line.len() as u64;
        self.write_seq = seq;
        Ok(seq)
    }

    fn write_durable(&mut self, line: &[u8]) -> io::Result<()> {
        self.file.write_all(line)?;
        self.file.sync_data()
    }

    pub fn sync(&self) -> Result<(), StorageError> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse complete lines up to the first bad one. Returns the entries and
/// the byte length of the intact prefix.
fn parse_entries(bytes: &[u8]) -> (Vec<LogEntry>, usize) {
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let Some(nl) = bytes[offset..].iter().position(|b| *b == b'\n') else {
            break;
        };
        let line = &bytes[offset..offset + nl];
        if !line.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice::<LogEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(_) => break,
            }
        }
        offset += nl + 1;
    }
    (entries, offset)
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
