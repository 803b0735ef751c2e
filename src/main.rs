//! bsp-fixture-server: a scripted build server for exercising BSP clients
//!
//! Speaks the build server protocol over stdin/stdout:
//! - Content-Length framed JSON-RPC 2.0 messages
//! - `build/initialize`, `build/initialized`, `build/shutdown`, `build/exit`
//! - `buildTarget/sources` with fixed fixture targets
//!
//! Features:
//! - One peer per process, requests answered in arrival order
//! - Optional strict lifecycle ordering
//! - Configuration via CLI arguments or TOML file
//!
//! Logs go to stderr; stdout carries protocol frames only.

mod config;
mod error;
mod protocol;
mod server;

use config::Config;
use server::{Server, Termination};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        strict = config.strict,
        read_timeout = ?config.read_timeout,
        max_frame_size = config.max_frame_size,
        "Starting bsp-fixture-server"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let strict = config.strict;
    let server = Server::new(config);

    let result = runtime.block_on(server.run());
    // A timed-out stdin read may still be parked on a blocking thread
    runtime.shutdown_background();

    match result {
        Ok(termination) => Ok(exit_code(termination, strict)),
        Err(e) => {
            error!(error = %e, protocol_violation = e.is_protocol_violation(), "Session failed");
            Ok(ExitCode::from(2))
        }
    }
}

/// Map how the session ended to the process exit status.
fn exit_code(termination: Termination, strict: bool) -> ExitCode {
    match termination {
        Termination::Exit { clean: false } if strict => {
            warn!("Exit without shutdown");
            ExitCode::from(1)
        }
        Termination::EndOfStream | Termination::PeerClosed | Termination::Exit { .. } => {
            ExitCode::SUCCESS
        }
    }
}
