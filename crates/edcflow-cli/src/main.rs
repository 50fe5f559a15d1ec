//! # edcflow
//!
//! Provision a provider connector and drive consumer negotiations and
//! transfers from a YAML scenario file.

mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "edcflow",
    version,
    about = "Drive dataspace connectors through provisioning, negotiation and transfer"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the provider, then run every consumer flow
    Run {
        /// Path to scenario YAML file
        scenario: PathBuf,
        /// Skip provider setup and only run consumer flows
        #[arg(long)]
        skip_provision: bool,
    },
    /// Register data planes and publish the provider's offer
    Provision {
        /// Path to scenario YAML file
        scenario: PathBuf,
    },
    /// Print the provider's catalog as seen by the consumer
    Catalog {
        /// Path to scenario YAML file
        scenario: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            scenario,
            skip_provision,
        } => commands::run::execute(&scenario, skip_provision).await,
        Commands::Provision { scenario } => commands::provision::execute(&scenario).await,
        Commands::Catalog { scenario } => commands::catalog::execute(&scenario).await,
    }
}
