//! Remote end of an `scp` transfer.
//!
//! Installed as (or invoked in place of) `scp` on the serving host: the SSH
//! session runs `scp -t <path>` or `scp -f <path>` and wires the channel to
//! this process's stdin/stdout. Logs go to stderr; stdout carries protocol
//! bytes only.

use anyhow::{Context, Result};
use scpwire::config::EngineConfig;
use scpwire::scp::{TransferRequest, TransferStats};
use scpwire::server;
use std::ffi::OsString;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<OsString> = std::env::args_os().collect();

    // A bad invocation never reaches the wire.
    let request = match TransferRequest::parse(argv) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("scp: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(request.verbose);

    match run(&request).await {
        Ok(stats) => {
            if stats.unmatched_end {
                tracing::warn!("peer closed more directories than it opened");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(request: &TransferRequest) -> Result<TransferStats> {
    let config = match EngineConfig::discover() {
        Ok(config) => config,
        Err(e) => {
            if let Err(send_err) = server::refuse(server::Stdio::new(), &e.to_string()).await {
                tracing::debug!("could not report fault to peer: {}", send_err);
            }
            return Err(e).context("Failed to load configuration");
        }
    };

    let stats = server::run_server(request, &config)
        .await
        .with_context(|| format!("Transfer of {} failed", request.destination.display()))?;

    Ok(stats)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
