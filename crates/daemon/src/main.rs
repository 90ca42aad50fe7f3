// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `axd`: the daemon and the processes it spawns.
//!
//! One binary plays every role. `serve` is the long-running daemon; the
//! other subcommands are started by it (a supervisor per runtime) or by
//! each other (job and worker processes) and speak frames on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use ax_daemon::{env, Config};
use ax_runner::builtin;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "axd", version, about = "Cached, fingerprinted job execution daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground
    Serve,
    /// Serve one runtime's methods over stdin/stdout
    Supervisor {
        /// Runtime name, as configured in AX_RUNTIMES
        #[arg(long)]
        runtime: String,
    },
    /// Run one job from its directory
    Job {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Analyze one slice of a job
    Worker {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        slice: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    match cli.command {
        Command::Serve => {
            let config = Config::load()?;
            let _guard = init_file_logging(&config.logs_path)?;
            runtime.block_on(ax_daemon::serve(config))?;
            Ok(())
        }
        Command::Supervisor { runtime: name } => {
            init_stderr_logging();
            let registry = Arc::new(builtin::registry()?);
            let program = std::env::current_exe()?;
            tracing::info!(runtime = %name, methods = registry.len(), "supervisor starting");
            runtime.block_on(ax_runner::serve_supervisor(
                registry,
                program,
                tokio::io::stdin(),
                tokio::io::stdout(),
            ))?;
            Ok(())
        }
        // Phase threads that ignore cancellation would keep the runtime
        // from shutting down, so job and worker processes exit directly.
        Command::Job { dir } => {
            init_stderr_logging();
            let registry = builtin::registry()?;
            let program = std::env::current_exe()?;
            let result = runtime.block_on(ax_runner::run_job(&registry, &program, &dir));
            exit_with(result.map_err(anyhow::Error::from))
        }
        Command::Worker { dir, slice } => {
            init_stderr_logging();
            let registry = builtin::registry()?;
            let result = runtime.block_on(ax_runner::run_worker(&registry, &dir, slice));
            exit_with(result.map_err(anyhow::Error::from))
        }
    }
}

fn exit_with(result: Result<()>) -> ! {
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("axd: {e:#}");
            std::process::exit(1)
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_new(env::log_filter()).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Stdout carries frames in every role but `serve`.
fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(filter())
        .init();
}

fn init_file_logging(logs: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(logs).with_context(|| format!("creating {}", logs.display()))?;
    let appender = tracing_appender::rolling::daily(logs, "axd.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter())
        .init();
    Ok(guard)
}
