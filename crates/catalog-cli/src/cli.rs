use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Inspect and export the car catalog from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the catalog database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search brands, sub-brands and models
    #[command(alias = "find")]
    Search {
        /// Search query (at least 2 characters to match)
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every entity of one kind
    List {
        #[arg(value_enum)]
        kind: EntityKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show entity counts
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the whole catalog
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Output file or directory (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EntityKind {
    Brands,
    SubBrands,
    Models,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for catalog_core::export::ExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}
