// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ax daemon: owns the job database, the runtime supervisors and the
//! client socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod env;
pub mod lifecycle;
mod listener;

pub use client::{ClientError, DaemonClient, Submitted};
pub use lifecycle::{startup, Config, Daemon, LifecycleError, StartupResult};

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::info;

use listener::{ListenCtx, Listener};

/// Start the daemon and serve until a `Shutdown` request or SIGTERM/SIGINT.
pub async fn serve(config: Config) -> Result<(), LifecycleError> {
    let StartupResult { daemon, listener } = startup(&config).await?;

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx {
        orchestrator: daemon.orchestrator.clone(),
        shutdown: Arc::clone(&shutdown),
        ipc_timeout: config.ipc_timeout,
    });
    let accept = tokio::spawn(Listener::new(listener, ctx).run());

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested"),
        _ = term.recv() => info!("SIGTERM received"),
        _ = int.recv() => info!("SIGINT received"),
    }

    // Stop accepting before tearing anything down
    accept.abort();
    daemon.shutdown().await
}
