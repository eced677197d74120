//! Agent-facing tool server over stdio.

mod params;
mod server;

use anyhow::{Context, Result};
use log::info;
use rmcp::{transport::stdio, ServiceExt};

pub use server::BambooServer;

/// Serve tools on stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: BambooServer) -> Result<()> {
    info!("Starting Bamboo tool server on stdio");

    let service = server
        .serve(stdio())
        .await
        .context("Failed to start tool server")?;
    let reason = service.waiting().await?;

    info!("Tool server stopped: {reason:?}");
    Ok(())
}
