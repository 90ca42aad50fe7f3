// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ax_core::{Clock, SystemClock};
use ax_engine::{JobExecutor, Orchestrator, StatusBus, SupervisorPool};
use ax_storage::JobDb;
use fs2::FileExt;
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{Config, Daemon, LifecycleError, StartupResult};

/// How long a runtime may take to describe its methods
const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock:
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directory (needed for socket, lock, etc.)
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Use OpenOptions to avoid truncating the file before we hold the lock,
    // which would wipe the running daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file (truncate now that we hold the lock)
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file; // Drop mutability

    // 3. Validate and create directories
    config.validate()?;
    std::fs::create_dir_all(&config.logs_path)?;
    std::fs::create_dir_all(&config.workdirs_path)?;

    // 4. Replay every WorkDir log
    let db = Arc::new(JobDb::open(config.workdir_paths()));
    let broken = db.broken();
    for (workdir, reason) in &broken {
        warn!(workdir = %workdir, reason = %reason, "workdir needs repair before use");
    }
    info!(workdirs = config.workdirs.len(), broken = broken.len(), "job database open");

    // 5. Jobs a previous daemon left running will never finish
    let interrupted = db.abort_interrupted(SystemClock.epoch_ms())?;
    if !interrupted.is_empty() {
        warn!(count = interrupted.len(), "aborted jobs interrupted by a previous daemon");
    }

    // 6. Status bus, mirrored into the log at debug
    let bus = StatusBus::default();
    spawn_status_logger(bus.subscribe());

    // 7. Start one supervisor per runtime and collect their methods
    let supervisors = Arc::new(SupervisorPool::start(
        config.runtimes.iter().map(|(name, program)| (name.as_str(), program.as_path())),
        &bus,
        config.kill_grace,
    )?);
    let catalog = match supervisors.catalog(DESCRIBE_TIMEOUT).await {
        Ok(catalog) => catalog,
        Err(e) => {
            supervisors.shutdown().await;
            return Err(e.into());
        }
    };
    info!(methods = catalog.len(), "method catalog built");

    // 8. Orchestrator
    let executor: Arc<dyn JobExecutor> = Arc::clone(&supervisors) as Arc<dyn JobExecutor>;
    let orchestrator_config = config.orchestrator.clone().socket(config.socket_path.clone());
    let orchestrator = Orchestrator::new(db, catalog, executor, bus, orchestrator_config, SystemClock);

    // 9. Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = match UnixListener::bind(&config.socket_path) {
        Ok(listener) => listener,
        Err(e) => {
            supervisors.shutdown().await;
            return Err(LifecycleError::BindFailed(config.socket_path.clone(), e));
        }
    };

    info!(socket = %config.socket_path.display(), "Daemon started");

    Ok(StartupResult {
        daemon: Daemon {
            config: config.clone(),
            lock_file,
            orchestrator,
            supervisors,
            start_time: Instant::now(),
        },
        listener,
    })
}

/// Mirror status events into the log at debug level.
fn spawn_status_logger(mut rx: broadcast::Receiver<ax_core::StatusEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let job = event.job.as_ref().map(ToString::to_string).unwrap_or_default();
                    debug!(job = %job, path = %event.path.join("/"), kind = ?event.kind, "status");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "status logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }

    // Remove PID/lock file
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
