// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-group signalling.
//!
//! A job process leads its own group and its workers inherit it, so one
//! signal to the group reaches every process of the job.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::process::ExitStatus;
use tokio::process::Child;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Send `signal` to process group `pgid`. A group that is already gone is
/// not an error.
pub fn signal_group(pgid: u32, signal: Signal) {
    let Ok(raw) = i32::try_from(pgid) else {
        return;
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid, %signal, error = %e, "killpg failed"),
    }
}

/// Wait for `child`, giving up after `limit`.
pub async fn wait_for(child: &mut Child, limit: std::time::Duration) -> Option<ExitStatus> {
    match tokio::time::timeout(limit, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "wait failed");
            None
        }
        Err(_) => None,
    }
}

/// Human-readable exit description: `exit code 3`, `signal 9`.
pub fn describe_exit(status: Option<ExitStatus>) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status {
        Some(s) => match (s.code(), s.signal()) {
            (Some(code), _) => format!("exit code {code}"),
            (None, Some(sig)) => format!("signal {sig}"),
            (None, None) => s.to_string(),
        },
        None => "unknown exit status".to_string(),
    }
}

/// Cancel `token` when this process receives SIGTERM.
pub fn cancel_on_sigterm(token: CancellationToken) -> std::io::Result<()> {
    let mut term = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        if term.recv().await.is_some() {
            tracing::info!("SIGTERM received, cancelling");
            token.cancel();
        }
    });
    Ok(())
}

/// What a panicked phase said, for the failure message.
pub(crate) fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
