// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ax_core::{validate_workdir_name, PhaseTimeouts};
use ax_engine::{Orchestrator, OrchestratorConfig, SupervisorError, SupervisorPool};
use ax_storage::StorageError;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::env;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/ax)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Directory of the daemon's own log files
    pub logs_path: PathBuf,
    /// Parent of every WorkDir
    pub workdirs_path: PathBuf,
    /// WorkDir names, in configuration order
    pub workdirs: Vec<String>,
    /// `(runtime, program)` of every supervisor to start
    pub runtimes: Vec<(String, PathBuf)>,
    pub orchestrator: OrchestratorConfig,
    pub kill_grace: Duration,
    pub ipc_timeout: Duration,
}

impl Config {
    /// Configuration rooted at `state_dir`, with every setting at its default.
    pub fn at(state_dir: impl Into<PathBuf>, runtimes: Vec<(String, PathBuf)>) -> Self {
        let state_dir = state_dir.into();
        Self {
            socket_path: state_dir.join("axd.sock"),
            lock_path: state_dir.join("axd.pid"),
            logs_path: state_dir.join("logs"),
            workdirs_path: state_dir.join("workdirs"),
            workdirs: vec!["default".to_string()],
            runtimes,
            orchestrator: OrchestratorConfig::new("default"),
            kill_grace: Duration::from_secs(2),
            ipc_timeout: Duration::from_secs(5),
            state_dir,
        }
    }

    /// Load configuration from the environment.
    ///
    /// Without `AX_RUNTIMES` the running executable serves as the only
    /// runtime, `default`.
    pub fn load() -> Result<Self, LifecycleError> {
        let runtimes = match env::runtimes() {
            Some(raw) => env::parse_runtimes(&raw)?,
            None => vec![("default".to_string(), std::env::current_exe()?)],
        };
        let workdirs = env::workdirs();
        let target = env::target_workdir().or_else(|| workdirs.first().cloned()).unwrap_or_default();
        let slices = env::slices();
        let mut orchestrator = OrchestratorConfig::new(target).slices(slices).timeouts(PhaseTimeouts {
            prepare_ms: env::prepare_timeout().as_millis() as u64,
            analyze_ms: env::analyze_timeout().as_millis() as u64,
            synthesize_ms: env::synthesize_timeout().as_millis() as u64,
        });
        if let Some(concurrency) = env::concurrency() {
            orchestrator = orchestrator.concurrency(concurrency);
        }

        let mut config = Self::at(env::state_dir()?, runtimes);
        config.workdirs = workdirs;
        config.orchestrator = orchestrator;
        config.kill_grace = env::kill_grace();
        config.ipc_timeout = env::ipc_timeout();
        config.validate()?;
        Ok(config)
    }

    /// Reject names that cannot be WorkDirs, duplicates, and a target
    /// that is not configured.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.runtimes.is_empty() {
            return Err(LifecycleError::Config("no runtimes configured".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for name in &self.workdirs {
            validate_workdir_name(name).map_err(|e| LifecycleError::Config(e.to_string()))?;
            if !seen.insert(name.as_str()) {
                return Err(LifecycleError::Config(format!("workdir {name:?} listed twice")));
            }
        }
        let target = &self.orchestrator.target_workdir;
        if !seen.contains(target.as_str()) {
            return Err(LifecycleError::Config(format!("target workdir {target:?} is not configured")));
        }
        Ok(())
    }

    pub fn workdir_path(&self, name: &str) -> PathBuf {
        self.workdirs_path.join(name)
    }

    fn workdir_paths(&self) -> impl Iterator<Item = (String, PathBuf)> + '_ {
        self.workdirs.iter().map(|name| (name.clone(), self.workdir_path(name)))
    }
}

/// Daemon state during operation.
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub orchestrator: Orchestrator,
    pub supervisors: Arc<SupervisorPool>,
    pub start_time: Instant,
}

/// Result of daemon startup: the daemon and its bound socket.
pub struct StartupResult {
    pub daemon: Daemon,
    pub listener: UnixListener,
}

impl Daemon {
    /// Shutdown the daemon gracefully.
    ///
    /// Supervisors are told to stop and get the kill grace to exit; their
    /// running jobs are cancelled and become aborted in the log.
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop supervisors (and with them every job process)
        self.supervisors.shutdown().await;

        // 2. Flush every WorkDir log
        if let Err(e) = self.orchestrator.db().close() {
            warn!("Failed to sync job logs: {}", e);
        }

        // 3. Remove socket file
        remove_if_exists(&self.config.socket_path, "socket");

        // 4. Remove PID file; the lock goes with self.lock_file
        remove_if_exists(&self.config.lock_path, "PID");

        info!(uptime_s = self.start_time.elapsed().as_secs(), "Daemon shutdown complete");
        Ok(())
    }
}

fn remove_if_exists(path: &Path, what: &str) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove {} file: {}", what, e);
        }
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
