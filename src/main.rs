mod auth;
mod bamboo;
mod cli;
mod config;
mod error;
mod mcp;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the tool protocol; env_logger writes to stderr.
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting bamboo-mcp");
    cli.execute().await?;

    Ok(())
}
