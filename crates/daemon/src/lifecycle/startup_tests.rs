// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::tempdir;

use super::*;

fn test_config(state_dir: &Path) -> Config {
    Config::at(state_dir, vec![("default".to_string(), PathBuf::from("/nonexistent/axd"))])
}

#[tokio::test]
async fn startup_lock_failed_does_not_remove_existing_files() {
    // Simulate a running daemon by holding the lock and creating its files.
    // A second startup attempt must fail without deleting anything.
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    std::fs::write(&config.socket_path, b"").unwrap();
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)
        .unwrap();
    lock_file.lock_exclusive().unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    match startup(&config).await {
        Err(LifecycleError::LockFailed(_)) => {}
        Err(e) => panic!("expected LockFailed, got: {e}"),
        Ok(_) => panic!("expected LockFailed, but startup succeeded"),
    }

    assert!(config.socket_path.exists(), "socket file must not be deleted on LockFailed");
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), "12345");
}

#[test]
fn lock_file_not_truncated_before_lock_acquired() {
    // A running daemon's PID must survive another process opening the file.
    let dir = tempdir().unwrap();
    let lock_path = dir.path().join("test.lock");

    let running_lock = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .unwrap();
    running_lock.lock_exclusive().unwrap();
    let mut f = &running_lock;
    writeln!(f, "99999").unwrap();

    // Same OpenOptions as startup_inner
    let _second = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .unwrap();

    let content = std::fs::read_to_string(&lock_path).unwrap();
    assert_eq!(content.trim(), "99999", "lock file content must not be truncated by another open");
}

#[tokio::test]
async fn missing_runtime_program_fails_and_cleans_up() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    match startup(&config).await {
        Err(LifecycleError::Supervisor(_)) => {}
        Err(e) => panic!("expected Supervisor error, got: {e}"),
        Ok(_) => panic!("startup with a missing runtime succeeded"),
    }

    assert!(!config.lock_path.exists(), "PID file should be cleaned up");
    assert!(!config.socket_path.exists(), "socket must not be bound");
    // WorkDirs were replayed before the supervisors were started
    assert!(config.workdir_path("default").is_dir());
}

#[tokio::test]
async fn invalid_config_fails_after_lock_and_cleans_up() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.workdirs = vec!["bad/name".to_string()];

    assert!(matches!(startup(&config).await, Err(LifecycleError::Config(_))));
    assert!(!config.lock_path.exists());
}

#[test]
fn cleanup_on_failure_removes_created_files() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    std::fs::write(&config.socket_path, b"").unwrap();
    std::fs::write(&config.lock_path, b"12345").unwrap();

    cleanup_on_failure(&config);

    assert!(!config.socket_path.exists(), "socket should be cleaned up on non-lock failure");
    assert!(!config.lock_path.exists(), "lock file should be cleaned up on non-lock failure");
}
