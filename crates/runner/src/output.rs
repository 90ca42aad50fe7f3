// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame writer for job and worker stdout.

use ax_core::StatusEvent;
use ax_wire::{send, ProtocolError};
use serde::Serialize;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};

/// Write status frames as they arrive, then the one final message.
///
/// Status still queued when the final message arrives is written before
/// it. Status senders may outlive this (a timed-out phase keeps its thread),
/// so only the final message ends the stream.
pub(crate) async fn pump<W, M>(
    mut out: W,
    mut status: mpsc::UnboundedReceiver<StatusEvent>,
    mut last: oneshot::Receiver<M>,
    wrap: fn(StatusEvent) -> M,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    M: Serialize,
{
    loop {
        tokio::select! {
            biased;
            Some(event) = status.recv() => send(&mut out, &wrap(event)).await?,
            message = &mut last => {
                while let Ok(event) = status.try_recv() {
                    send(&mut out, &wrap(event)).await?;
                }
                if let Ok(message) = message {
                    send(&mut out, &message).await?;
                }
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
