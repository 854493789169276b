//! Pegboard MCP server binary.
//!
//! This binary runs the MCP server using stdio transport.

use pegboard_mcp::PegboardMcpServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting pegboard-mcp server");

    let server = PegboardMcpServer::new();
    server.run().await?;

    Ok(())
}
