// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ax_core::JobId;
use tempfile::tempdir;

fn setup(dir: &Path) -> JobSetup {
    let mut workdirs = BTreeMap::new();
    workdirs.insert("w".to_string(), dir.to_path_buf());
    JobSetup {
        version: SETUP_VERSION,
        job: Job::builder().id(JobId::new("w", 2)).build(),
        runtime: "default".into(),
        slices: 4,
        concurrency: None,
        timeouts: PhaseTimeouts::default(),
        workdirs,
        socket: Some(dir.join("axd.sock")),
    }
}

#[test]
fn setup_round_trips() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("w-2");
    let written = setup(dir.path());

    write_setup(&job_dir, &written).unwrap();

    assert_eq!(read_setup(&job_dir).unwrap(), written);
    assert!(!job_dir.join("setup.json.tmp").exists());
}

#[test]
fn rewrite_replaces_content() {
    let dir = tempdir().unwrap();
    let mut s = setup(dir.path());
    write_setup(dir.path(), &s).unwrap();
    s.job.ended_at_ms = Some(99);
    write_setup(dir.path(), &s).unwrap();
    assert_eq!(read_setup(dir.path()).unwrap().job.ended_at_ms, Some(99));
}

#[test]
fn job_dir_uses_known_workdirs() {
    let dir = tempdir().unwrap();
    let s = setup(dir.path());
    assert_eq!(s.job_dir(&JobId::new("w", 0)), Some(dir.path().join("w-0")));
    assert_eq!(s.job_dir(&JobId::new("other", 0)), None);
}

#[test]
fn missing_setup_is_io_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(read_setup(dir.path()), Err(StorageError::Io(_))));
}
