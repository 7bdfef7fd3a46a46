//! Treesync CLI - import tree specifications into live tree snapshots.
//!
//! Both the specification and the snapshot are JSON trees in the engine's
//! wire format. The snapshot plays the role of the live tree: it is loaded,
//! synchronized with the specification and written back.

mod commands;
mod config;
mod error;

use crate::config::Config;
use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "treesync", version, about = "Synchronize tree snapshots with specifications")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a specification into a snapshot and write the result
    Import {
        /// Specification JSON file
        spec: PathBuf,
        /// Snapshot JSON file, created when missing
        tree: PathBuf,
        /// Where to write the result instead of overwriting TREE
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the edits an import would make, without writing anything
    Plan {
        /// Specification JSON file
        spec: PathBuf,
        /// Snapshot JSON file
        tree: PathBuf,
    },
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treesync=info,treesync_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), AppError> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    match command {
        Command::Import { spec, tree, out } => {
            commands::import(&config, &spec, &tree, out.as_deref())
        }
        Command::Plan { spec, tree } => commands::plan(&config, &spec, &tree),
    }
}
