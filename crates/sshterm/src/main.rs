//! # sshterm
//!
//! Interactive terminal client: runs a shell on a remote host (through the
//! system ssh client) or locally, forwarding keystrokes and rendering the
//! colored output.

use clap::Parser;
use sshterm::{app, logging, Cli, Outcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Initialize logging
    if logging::init(&config.logging)? {
        tracing::info!("sshterm v{} starting", env!("CARGO_PKG_VERSION"));
    }

    let credentials = cli.credentials(&config)?;
    let connector = cli.connector(&config);

    let outcome = app::run(&config, &connector, &credentials).await.map_err(|e| {
        tracing::error!("Session error: {:#}", e);
        e
    })?;

    if let Outcome::Failed(message) = &outcome {
        eprintln!("sshterm: {message}");
    }

    tracing::info!("sshterm exiting with {}", outcome.exit_code());
    std::process::exit(outcome.exit_code());
}
