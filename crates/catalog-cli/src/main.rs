//! Catalog CLI - operator access to the car catalog database
//!
//! Runs searches, lists entities and exports the catalog without the API.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_db_path;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::search::run_search;
use crate::commands::stats::run_stats;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so JSON output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("catalog=warn")),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    tracing::debug!("Using catalog database at {}", db_path.display());

    match cli.command {
        Commands::Search { query, json } => run_search(&query, json, &db_path).await?,
        Commands::List { kind, json } => run_list(kind, json, &db_path).await?,
        Commands::Stats { json } => run_stats(json, &db_path).await?,
        Commands::Export { format, output } => {
            run_export(format, output.as_deref(), &db_path).await?;
        }
    }

    Ok(())
}
