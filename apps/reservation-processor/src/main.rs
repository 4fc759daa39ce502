//! Reservation Processor — Entry Point

use clap::{Parser, Subcommand};
use eyre::Result;

#[derive(Parser)]
#[command(name = "reservation-processor")]
#[command(about = "Drives the GPU reservation state machine from the reservation and disk-op queues")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the worker, consuming both queues until shut down.
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => reservation_processor::run().await,
    }
}
