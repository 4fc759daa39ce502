//! Expiry & Warning Engine — Entry Point

use clap::{Parser, Subcommand};
use eyre::Result;

#[derive(Parser)]
#[command(name = "expiry-engine")]
#[command(about = "Enforces reservation time budgets and emits the expiry warning ladder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run forever on the configured cadence.
    Run,
    /// Run a single tick and exit.
    Tick,
    /// Run a single tick and print the resulting stats as JSON.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => expiry_engine::run().await,
        Commands::Tick => {
            expiry_engine::tick().await?;
            Ok(())
        }
        Commands::Status => {
            let stats = expiry_engine::tick().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
    }
}
