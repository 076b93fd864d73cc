//! NewsDigest CLI: AI-summarized news digests with sentiment analysis.
//!
//! Fetches recent articles on a topic, summarizes and classifies each one
//! with a language model, and prints a markdown report or a JSON record.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli)?;
    commands::run(cli).await
}
