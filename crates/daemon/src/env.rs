// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

const DEFAULT_PHASE_TIMEOUT: Duration = Duration::from_secs(6 * 60 * 60);

/// Resolve state directory: AX_STATE_DIR > XDG_STATE_HOME/ax > ~/.local/state/ax
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("AX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ax"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/ax"))
}

/// WorkDir names from `AX_WORKDIRS` (comma-separated, default `default`)
pub fn workdirs() -> Vec<String> {
    std::env::var("AX_WORKDIRS")
        .ok()
        .map(|s| parse_list(&s))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec!["default".to_string()])
}

pub fn target_workdir() -> Option<String> {
    std::env::var("AX_TARGET_WORKDIR").ok().filter(|s| !s.is_empty())
}

/// Analyze-phase slice count (default: available parallelism)
pub fn slices() -> u32 {
    parse_u32("AX_SLICES").filter(|&n| n > 0).unwrap_or_else(|| {
        std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1)
    })
}

pub fn concurrency() -> Option<u32> {
    parse_u32("AX_CONCURRENCY").filter(|&n| n > 0)
}

pub fn prepare_timeout() -> Duration {
    duration_ms("AX_PREPARE_TIMEOUT_MS").unwrap_or(DEFAULT_PHASE_TIMEOUT)
}

pub fn analyze_timeout() -> Duration {
    duration_ms("AX_ANALYZE_TIMEOUT_MS").unwrap_or(DEFAULT_PHASE_TIMEOUT)
}

pub fn synthesize_timeout() -> Duration {
    duration_ms("AX_SYNTHESIZE_TIMEOUT_MS").unwrap_or(DEFAULT_PHASE_TIMEOUT)
}

/// Grace between SIGTERM and SIGKILL
pub fn kill_grace() -> Duration {
    duration_ms("AX_KILL_GRACE_MS").unwrap_or(Duration::from_secs(2))
}

/// Default IPC timeout
pub fn ipc_timeout() -> Duration {
    duration_ms("AX_IPC_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Raw `AX_RUNTIMES` value, if set
pub fn runtimes() -> Option<String> {
    std::env::var("AX_RUNTIMES").ok().filter(|s| !s.trim().is_empty())
}

/// Tracing filter directive (default `info`)
pub fn log_filter() -> String {
    std::env::var("AX_LOG").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "info".to_string())
}

/// Parse `name=program;name=program`.
pub fn parse_runtimes(raw: &str) -> Result<Vec<(String, PathBuf)>, LifecycleError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((name, program)) if !name.trim().is_empty() && !program.trim().is_empty() => {
                Ok((name.trim().to_string(), PathBuf::from(program.trim())))
            }
            _ => Err(LifecycleError::Config(format!("bad AX_RUNTIMES entry {entry:?}"))),
        })
        .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

fn parse_u32(var: &str) -> Option<u32> {
    std::env::var(var).ok().and_then(|s| s.parse::<u32>().ok())
}

fn duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
