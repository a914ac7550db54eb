//! Redraft CLI — article scraping and LLM enhancement tool.
//!
//! Scrapes web articles into a backend store and rewrites them as
//! reference-grounded enhanced renditions.

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
