//! Command-line client for the shared prize inventory
//!
//! Reads and mutates the inventory document kept under `--store`, and can run
//! an in-process simulation of several clients drawing at once.

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use countkun_core::CounterVector;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{mutate, show, simulate};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "countkun")]
#[command(about = "Countkun - shared prize counter with synchronized history", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Config file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the inventory document
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Actor to sign in as
    #[arg(long, global = true)]
    actor: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show remaining counts per rank
    Show {
        /// Print the full view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the history as chart rows
    History {
        /// Print chart points as JSON
        #[arg(long)]
        json: bool,
    },

    /// Draw one prize
    Draw {
        /// Rank number, 1 to 5
        rank: usize,
    },

    /// Zero every count and clear the history
    Reset,

    /// Start a new round with the given counts (blank fields count as zero)
    Reseed {
        /// Five counts, one per rank
        #[arg(num_args = 5, value_names = ["1等", "2等", "3等", "4等", "5等"])]
        counts: Vec<String>,
    },

    /// Simulate several clients drawing concurrently
    Simulate {
        /// Number of clients
        #[arg(short = 'n', long, default_value = "3")]
        clients: usize,

        /// Draws attempted by each client
        #[arg(short, long, default_value = "5")]
        draws: usize,

        /// Starting counts, comma separated
        #[arg(short, long, default_value = "5,5,5,5,5")]
        initial: String,

        /// Seed for the clients' rank choices
        #[arg(short, long, default_value = "0")]
        seed: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = CliConfig::load(cli.config.as_deref())?.with_overrides(cli.store, cli.actor);

    match cli.command {
        Commands::Show { json } => show::show(&config, json).await?,
        Commands::History { json } => show::history(&config, json).await?,
        Commands::Draw { rank } => mutate::draw(&config, rank).await?,
        Commands::Reset => mutate::reset(&config).await?,
        Commands::Reseed { counts } => mutate::reseed(&config, &counts).await?,
        Commands::Simulate {
            clients,
            draws,
            initial,
            seed,
        } => {
            let fields: Vec<&str> = initial.split(',').collect();
            let initial = CounterVector::parse_inputs(&fields).map_err(commands::report)?;
            simulate::simulate(
                &config.store,
                simulate::SimulateOptions {
                    clients,
                    draws,
                    initial,
                    seed,
                },
            )
            .await?;
        }
    }

    Ok(())
}
