//! recmap Command-Line Client
//!
//! Opens a store, registers the built-in clinic schema and runs one command
//! against it.

mod commands;
mod error;
mod formatter;
mod schema;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;
use recmap_core::{Database, StorageConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// recmap Command-Line Client
#[derive(Parser, Debug)]
#[command(name = "recmap")]
#[command(version, about = "recmap Command-Line Client")]
pub struct Args {
    /// Directory holding the store
    #[arg(short = 'd', long, default_value = "./recmap_data")]
    pub data_dir: PathBuf,

    /// Use a throwaway in-memory store, seeded with the sample rows
    #[arg(long, conflicts_with = "data_dir")]
    pub temporary: bool,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Commands run against the store.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register the schema and insert the sample clinic rows
    Seed,

    /// Print the rows of an entity type
    List {
        /// Entity type, e.g. Restaurant
        entity: String,

        /// Order by an attribute, e.g. rating:desc
        #[arg(long)]
        order: Option<String>,
    },

    /// Print one row and its resolved associations
    Show {
        /// Entity type
        entity: String,
        /// Row id
        id: u64,
    },

    /// Delete one row
    Delete {
        /// Entity type
        entity: String,
        /// Row id
        id: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recmap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<String, CliError> {
    let config = if args.temporary {
        StorageConfig::temporary()
    } else {
        std::fs::create_dir_all(&args.data_dir)?;
        StorageConfig::new(&args.data_dir)
    };

    let db = Database::open(config)?;
    schema::register(&db)?;
    if args.temporary && !matches!(args.command, Command::Seed) {
        schema::seed(&db)?;
    }

    let formatter = formatter::create_formatter(args.format);
    let output = commands::execute(&db, args.command, &*formatter)?;
    db.flush()?;
    Ok(output)
}
