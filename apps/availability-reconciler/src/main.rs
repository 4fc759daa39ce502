//! Availability Reconciler — Entry Point

use clap::{Parser, Subcommand};
use eyre::Result;

#[derive(Parser)]
#[command(name = "availability-reconciler")]
#[command(about = "Reconciles GPU-type availability and the volume catalog against cluster and cloud truth")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run forever on the configured cadence.
    Run,
    /// Run a single reconciliation pass and exit.
    Tick,
    /// Print current gpu-type/volume counters as JSON without reconciling anything.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => availability_reconciler::run().await,
        Commands::Tick => {
            availability_reconciler::tick().await?;
            Ok(())
        }
        Commands::Status => {
            let snapshot = availability_reconciler::status().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
    }
}
