//! docsync CLI
//!
//! Command-line tools for inspecting and maintaining the offline stores of a
//! docsync client.
//!
//! # Commands
//!
//! - `tables` - List tables with pending operations
//! - `pending` - List the pending operations of a table
//! - `tokens` - List cached partition tokens
//! - `purge-expired` - Delete pending operations that have expired

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docsync offline store tools.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory holding pending.json and tokens.json
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables with pending operations
    Tables {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the pending operations of a table
    Pending {
        /// Table name
        #[arg(short, long)]
        table: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List cached partition tokens
    Tokens {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete pending operations that have expired
    PurgeExpired {
        /// Dry run - show what would be deleted
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Tables { format } => {
            let path = cli.path.ok_or("Data path required for tables")?;
            commands::tables::run(&path, &format)?;
        }
        Commands::Pending { table, format } => {
            let path = cli.path.ok_or("Data path required for pending")?;
            commands::pending::run(&path, &table, &format)?;
        }
        Commands::Tokens { format } => {
            let path = cli.path.ok_or("Data path required for tokens")?;
            commands::tokens::run(&path, &format)?;
        }
        Commands::PurgeExpired { dry_run } => {
            let path = cli.path.ok_or("Data path required for purge-expired")?;
            commands::purge::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("docsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
