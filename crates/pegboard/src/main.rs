//! Pegboard CLI binary.

use anyhow::Result;
use pegboard::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the pegboard CLI.
///
/// Uses tokio's current_thread runtime; CLI commands are sequential
/// I/O-bound operations with nothing to gain from worker threads.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Controlled via RUST_LOG, e.g. RUST_LOG=pegboard=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pegboard=info")),
        )
        .with_target(false)
        .init();

    tracing::debug!("Starting pegboard CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    Ok(())
}
