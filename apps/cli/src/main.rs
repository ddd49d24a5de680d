//! GCN Watch CLI: polls GCN Circulars, extracts observational facts with a
//! local LLM, and posts new circulars to Slack.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let config = commands::load(&cli)?;
    commands::init_tracing(&cli, &config.logging);
    commands::run(cli, config).await
}
