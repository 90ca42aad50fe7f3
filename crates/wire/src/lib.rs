// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ax-wire: framing and messages for every process channel.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//!
//! Channels:
//! - orchestrator ⇄ supervisor: supervisor stdin/stdout, [`SupervisorRequest`] / [`SupervisorEvent`]
//! - supervisor ⇐ job process: job stdout, [`JobMessage`], exactly one `Result` last
//! - job process ⇄ worker: worker stdin/stdout, [`WorkerAssignment`] / [`WorkerMessage`]
//! - client ⇄ daemon: Unix socket, one [`Request`] / [`Response`] per connection

mod client;
mod frame;
mod job;
mod supervisor;
mod worker;

pub use client::{Candidate, NodeExplanation, Request, Response, Verdict, PROTOCOL_VERSION};
pub use frame::{
    decode, encode, read_message, read_request, recv, send, write_message, write_response,
    ProtocolError, MAX_MESSAGE_SIZE,
};
pub use job::{JobMessage, JobOutcome};
pub use supervisor::{ExecuteAssignment, SupervisorEvent, SupervisorRequest};
pub use worker::{WorkerAssignment, WorkerMessage};
