// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A real `axd serve` in a scratch state directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use ax_core::JobId;
use ax_daemon::DaemonClient;
use serde_json::Value;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

pub struct TestDaemon {
    child: Child,
    state_dir: PathBuf,
    pub client: DaemonClient,
}

impl TestDaemon {
    /// Start a daemon with three slices in `state_dir`.
    pub async fn start(state_dir: &Path) -> Self {
        Self::start_with(state_dir, &[]).await
    }

    pub async fn start_with(state_dir: &Path, envs: &[(&str, &str)]) -> Self {
        let child = spawn(state_dir, envs);
        let client = DaemonClient::new(state_dir.join("axd.sock"), Duration::from_secs(5));
        let mut daemon = Self { child, state_dir: state_dir.to_path_buf(), client };

        let deadline = Instant::now() + STARTUP_TIMEOUT;
        loop {
            if daemon.client.ping().await.is_ok() {
                return daemon;
            }
            if let Ok(Some(status)) = daemon.child.try_wait() {
                panic!("axd exited during startup ({status}):\n{}", daemon.log());
            }
            if Instant::now() > deadline {
                panic!("axd did not come up:\n{}", daemon.log());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.state_dir.join("workdirs").join(id.workdir()).join(id.to_string())
    }

    /// Contents of a job's `result.json`.
    pub fn result(&self, id: &JobId) -> Value {
        let path = self.job_dir(id).join("result.json");
        let bytes = std::fs::read(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Pids of live worker processes of job `id`.
    pub fn worker_pids(&self, id: &JobId) -> Vec<u32> {
        let job = id.to_string();
        let scratch = self.state_dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
                let cmdline = std::fs::read(entry.path().join("cmdline")).ok()?;
                let args: Vec<String> =
                    cmdline.split(|b| *b == 0).map(|a| String::from_utf8_lossy(a).into_owned()).collect();
                let is_worker = args.iter().any(|a| a == "worker")
                    && args.iter().any(|a| a.contains(&scratch) && a.ends_with(&job));
                is_worker.then_some(pid)
            })
            .collect()
    }

    /// Everything the daemon logged so far.
    pub fn log(&self) -> String {
        let mut out = String::new();
        if let Ok(entries) = std::fs::read_dir(self.state_dir.join("logs")) {
            for entry in entries.flatten() {
                out.push_str(&std::fs::read_to_string(entry.path()).unwrap_or_default());
            }
        }
        out
    }

    /// Ask the daemon to stop and wait for it to exit.
    pub async fn stop(mut self) {
        self.client.shutdown().await.unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                assert!(status.success(), "axd exited with {status}:\n{}", self.log());
                return;
            }
            assert!(Instant::now() < deadline, "axd did not stop:\n{}", self.log());
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Spawn `axd serve` without waiting for it.
pub fn spawn(state_dir: &Path, envs: &[(&str, &str)]) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_axd"));
    cmd.arg("serve")
        .env("AX_STATE_DIR", state_dir)
        .env("AX_SLICES", "3")
        .env("AX_LOG", "debug")
        .env_remove("AX_RUNTIMES")
        .env_remove("AX_WORKDIRS")
        .env_remove("AX_TARGET_WORKDIR")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.spawn().unwrap()
}
