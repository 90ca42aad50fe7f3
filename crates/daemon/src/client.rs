// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the daemon socket.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ax_core::{ErrorKind, Job, JobId, MethodSpec, Options, Submission};
use ax_wire::{NodeExplanation, ProtocolError, Request, Response, PROTOCOL_VERSION};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot connect to {0}: {1}")]
    Connect(PathBuf, #[source] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("daemon closed the connection without answering")]
    NoResponse,

    /// The submission failed; `node` names where.
    #[error("{kind}: {message}")]
    Submit { kind: ErrorKind, node: Option<String>, message: String },

    #[error("daemon error: {0}")]
    Daemon(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Successful submit as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub job: JobId,
    pub reused: bool,
    pub jobs: Vec<JobId>,
}

/// Talks to a running daemon, one connection per request.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { socket_path: socket_path.into(), timeout }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send `request` and wait for the reply.
    ///
    /// A submit waits as long as its job tree takes; everything else is
    /// bounded by the client's timeout.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|e| ClientError::Connect(self.socket_path.clone(), e))?;
        let (mut reader, mut writer) = stream.into_split();
        ax_wire::write_response(&mut writer, request, self.timeout).await?;
        let reply = if matches!(request, Request::Submit { .. }) {
            ax_wire::recv(&mut reader).await?
        } else {
            tokio::time::timeout(self.timeout, ax_wire::recv(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??
        };
        let response: Response = reply.ok_or(ClientError::NoResponse)?;
        match response {
            Response::Error { message } => Err(ClientError::Daemon(message)),
            other => Ok(other),
        }
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        match self.send(&Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Self::reject(other),
        }
    }

    /// Daemon protocol version
    pub async fn hello(&self) -> Result<String, ClientError> {
        let request = Request::Hello { version: PROTOCOL_VERSION.to_string() };
        match self.send(&request).await? {
            Response::Hello { version } => Ok(version),
            other => Self::reject(other),
        }
    }

    pub async fn submit(&self, submission: Submission) -> Result<Submitted, ClientError> {
        match self.send(&Request::Submit { submission }).await? {
            Response::Submitted { job, reused, jobs } => Ok(Submitted { job, reused, jobs }),
            other => Self::reject(other),
        }
    }

    pub async fn explain(&self, submission: Submission) -> Result<Vec<NodeExplanation>, ClientError> {
        match self.send(&Request::Explain { submission }).await? {
            Response::Explanation { nodes } => Ok(nodes),
            other => Self::reject(other),
        }
    }

    pub async fn job(&self, id: &JobId) -> Result<Option<Job>, ClientError> {
        match self.send(&Request::Job { id: id.clone() }).await? {
            Response::Job { job } => Ok(job.map(|b| *b)),
            other => Self::reject(other),
        }
    }

    pub async fn latest(
        &self,
        workdir: Option<&str>,
        method: &str,
        options: Options,
    ) -> Result<Option<Job>, ClientError> {
        let request = Request::Latest {
            workdir: workdir.map(str::to_string),
            method: method.to_string(),
            options,
        };
        match self.send(&request).await? {
            Response::Job { job } => Ok(job.map(|b| *b)),
            other => Self::reject(other),
        }
    }

    pub async fn methods(&self) -> Result<Vec<MethodSpec>, ClientError> {
        match self.send(&Request::Methods).await? {
            Response::Methods { methods } => Ok(methods),
            other => Self::reject(other),
        }
    }

    /// Rebuild a WorkDir; returns how many records were kept and what was dropped.
    pub async fn repair(&self, workdir: &str) -> Result<(usize, Vec<String>), ClientError> {
        match self.send(&Request::Repair { workdir: workdir.to_string() }).await? {
            Response::Repaired { kept, dropped, .. } => Ok((kept, dropped)),
            other => Self::reject(other),
        }
    }

    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(&Request::Shutdown).await? {
            Response::ShuttingDown => Ok(()),
            other => Self::reject(other),
        }
    }

    fn reject<T>(response: Response) -> Result<T, ClientError> {
        match response {
            Response::SubmitFailed { kind, node, message } => {
                Err(ClientError::Submit { kind, node, message })
            }
            Response::Error { message } => Err(ClientError::Daemon(message)),
            other => Err(ClientError::Unexpected(format!("{other:?}"))),
        }
    }
}
