//! proposalgen CLI: researches a company and writes an AI use case proposal.
//!
//! Runs four stages in sequence (research, use cases, resources, proposal)
//! against Gemini, Serper, and public model/dataset catalogs.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing();
    commands::run(cli).await
}
