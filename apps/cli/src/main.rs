//! serpwatch CLI: check where a domain ranks for a keyword and get advice.
//!
//! Runs the rank-check pipeline once from the command line, lists stored
//! runs, or serves the pipeline over HTTP.

mod commands;
mod server;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
