//! Parcel tracker command-line client.
//!
//! Every command opens the configured store, runs one operation and exits.
//! Exit code is 0 on success and 1 on any error.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parcel_store::{ClientId, ParcelNumber, ParcelService, ParcelStore, StoreConfig};
use std::process::ExitCode;
use tracing::debug;

mod cli;

/// Binary name, also the log file stem.
const APP_NAME: &str = "parcel";

use cli::output::OutputMode;

#[derive(Parser, Debug)]
#[command(name = "parcel", version, about = "Register and track parcels")]
struct Cli {
    /// Database URL (duckdb:<path> or duckdb::memory:)
    #[arg(long, global = true, env = "PARCEL_DB_URL")]
    db: Option<String>,

    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new parcel for a client
    Register {
        /// Owning client id
        #[arg(long)]
        client: ClientId,

        /// Delivery address
        #[arg(long)]
        address: String,
    },

    /// Show one parcel
    Get { number: ParcelNumber },

    /// List a client's parcels
    List {
        #[arg(long)]
        client: ClientId,
    },

    /// Show a parcel's current status
    Status { number: ParcelNumber },

    /// Set a parcel's status to any label
    SetStatus { number: ParcelNumber, status: String },

    /// Advance a parcel along registered -> sent -> delivered
    Next { number: ParcelNumber },

    /// Change the delivery address (only while registered)
    SetAddress { number: ParcelNumber, address: String },

    /// Delete a parcel (only while registered)
    Delete { number: ParcelNumber },

    /// Count parcels per status
    Stats,

    /// Show resolved paths and database URL
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_json_flag(cli.json);

    match parcel_logging::init_logging(parcel_logging::LogConfig {
        app_name: APP_NAME,
        verbose: cli.verbose,
        log_dir: parcel_store::config::logs_dir(),
    }) {
        Ok(log_file) => debug!(log_file = %log_file.display(), "Logging initialized"),
        Err(err) => eprintln!("Warning: Failed to initialize logging: {:#}", err),
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            cli::error::print_error(&err, mode);
            ExitCode::from(1)
        }
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let mode = OutputMode::from_json_flag(cli.json);
    let config = StoreConfig::resolve(cli.db.as_deref()).context("Failed to resolve store URL")?;

    match cli.command {
        Commands::Config => cli::config::run(&config, mode),
        Commands::Register { client, address } => {
            cli::parcels::register(&open_service(&config)?, client, &address, mode)
        }
        Commands::Get { number } => cli::parcels::get(&open_service(&config)?, number, mode),
        Commands::List { client } => cli::parcels::list(&open_service(&config)?, client, mode),
        Commands::Status { number } => {
            cli::parcels::status(&open_service(&config)?, number, mode)
        }
        Commands::SetStatus { number, status } => {
            cli::parcels::set_status(&open_service(&config)?, number, &status, mode)
        }
        Commands::Next { number } => cli::parcels::next(&open_service(&config)?, number, mode),
        Commands::SetAddress { number, address } => {
            cli::parcels::set_address(&open_service(&config)?, number, &address, mode)
        }
        Commands::Delete { number } => {
            cli::parcels::delete(&open_service(&config)?, number, mode)
        }
        Commands::Stats => cli::parcels::stats(&open_service(&config)?, mode),
    }
}

fn open_service(config: &StoreConfig) -> Result<ParcelService> {
    debug!(url = %config.url, "Opening parcel store");
    let store = ParcelStore::open(config)
        .with_context(|| format!("Failed to open parcel store at {}", config.url))?;
    Ok(ParcelService::new(store))
}
