mod auth;
mod cli;
mod config;
mod error;
mod flow;
mod output;
mod providers;
mod wait;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting orgflow");
    cli.execute().await?;

    Ok(())
}
