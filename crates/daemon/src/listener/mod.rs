// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! each one in its own task. A connection carries exactly one request.

use std::sync::Arc;
use std::time::Duration;

use ax_core::{Clock, SystemClock};
use ax_engine::{Orchestrator, SubmitError};
use ax_wire::{ProtocolError, Request, Response, PROTOCOL_VERSION};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared daemon context for all request handlers.
pub(crate) struct ListenCtx {
    pub orchestrator: Orchestrator,
    pub shutdown: Arc<Notify>,
    pub ipc_timeout: Duration,
}

/// Listener task for accepting socket connections.
pub(crate) struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub(crate) enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the listener loop, spawning a task for each connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("Unix accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(e: ConnectionError) {
    match e {
        ConnectionError::Protocol(ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected")
        }
        ConnectionError::Protocol(ProtocolError::Timeout) => {
            warn!("Connection timeout")
        }
        _ => error!("Connection error: {}", e),
    }
}

/// Handle a single client connection.
///
/// The handler races client disconnect detection. A client that goes away
/// mid-request cancels the handler's token; the handler still runs to the
/// end so that cancelled jobs are recorded as aborted.
pub(crate) async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ListenCtx,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let request: Request = ax_wire::read_request(&mut reader, ctx.ipc_timeout).await?;

    // Lookups are frequent, builds are not
    if matches!(request, Request::Submit { .. } | Request::Repair { .. } | Request::Shutdown) {
        info!(request = ?request, "received request");
    } else {
        debug!(request = ?request, "received request");
    }

    let token = CancellationToken::new();
    let handler = handle_request(request, ctx, token.clone());
    tokio::pin!(handler);
    let response = tokio::select! {
        response = &mut handler => response,
        _ = detect_client_disconnect(&mut reader) => {
            token.cancel();
            debug!("Client disconnected, cancelling handler");
            let _ = handler.await;
            return Ok(());
        }
    };

    debug!("Sending response: {:?}", response);
    ax_wire::write_response(&mut writer, &response, ctx.ipc_timeout).await?;
    Ok(())
}

/// Detect client disconnect by reading from the socket after the request.
///
/// In the request-response protocol, the client sends one request then waits.
/// If the client disconnects, reading returns 0 bytes (EOF).
async fn detect_client_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

/// Handle a single request and return a response.
///
/// `cancel` aborts a running submit; other requests finish quickly.
pub(crate) async fn handle_request(
    request: Request,
    ctx: &ListenCtx,
    cancel: CancellationToken,
) -> Response {
    let orchestrator = &ctx.orchestrator;
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                warn!(client = %version, daemon = PROTOCOL_VERSION, "protocol version mismatch");
            }
            Response::Hello { version: PROTOCOL_VERSION.to_string() }
        }

        Request::Submit { submission } => {
            match orchestrator.submit_with_cancel(submission, cancel).await {
                Ok(outcome) => Response::Submitted {
                    job: outcome.job.id,
                    reused: outcome.reused,
                    jobs: outcome.jobs,
                },
                Err(e) => submit_failed(&e),
            }
        }

        Request::Explain { submission } => match orchestrator.explain(&submission) {
            Ok(nodes) => Response::Explanation { nodes },
            Err(e) => submit_failed(&e),
        },

        Request::Job { id } => match orchestrator.db().get(&id) {
            Ok(job) => Response::Job { job: job.map(Box::new) },
            Err(e) => Response::Error { message: e.to_string() },
        },

        Request::Latest { workdir, method, options } => {
            let workdir = workdir.unwrap_or_else(|| orchestrator.config().target_workdir.clone());
            match orchestrator.latest(&workdir, &method, &options) {
                Ok(job) => Response::Job { job: job.map(Box::new) },
                Err(SubmitError::Storage { source, .. }) => Response::Error { message: source.to_string() },
                Err(e) => submit_failed(&e),
            }
        }

        Request::Methods => Response::Methods {
            methods: orchestrator.catalog().iter().map(|entry| (*entry.spec).clone()).collect(),
        },

        Request::Repair { workdir } => {
            match orchestrator.db().repair(&workdir, SystemClock.epoch_ms()) {
                Ok(report) => {
                    Response::Repaired { kept: report.kept, dropped: report.dropped, retired: report.retired }
                }
                Err(e) => Response::Error { message: e.to_string() },
            }
        }

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

fn submit_failed(e: &SubmitError) -> Response {
    Response::SubmitFailed {
        kind: e.kind(),
        node: e.node().map(str::to_string),
        message: e.to_string(),
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
