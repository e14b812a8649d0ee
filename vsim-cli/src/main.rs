//! # vsim CLI
//!
//! Drives an in-memory virtualization management simulator: an object
//! registry, a task engine and a property collector over a small generated
//! inventory.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::SimConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vsim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "vsim.yml", env = "VSIM_CONFIG")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the simulated inventory
    Inventory {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Subscribe to machine changes while powering machines on
    Watch {
        /// How many machines to power on
        #[arg(long, default_value_t = 1)]
        power_on: usize,

        /// Emit one JSON update set per line
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SimConfig::load(&cli.config)?;

    match cli.command {
        Commands::Inventory { json } => commands::show_inventory(&config, json),
        Commands::Watch { power_on, json } => commands::watch_updates(&config, power_on, json).await,
        Commands::Config => commands::show_config(&config),
    }
}
