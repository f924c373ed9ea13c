//! quizbank: quiz archive ingestion service.
//!
//! Accepts ZIP bundles of exported quiz documents, extracts their questions,
//! and serves them back over HTTP.

#![recursion_limit = "256"]

mod commands;

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
