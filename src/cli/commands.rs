//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// HubSpot CRM extractor
#[derive(Parser, Debug)]
#[command(name = "hubspot-tap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// State file (JSON), read on start and rewritten at each checkpoint
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the stream catalog as JSON
    Discover,

    /// List stream names
    Streams,

    /// Sync streams, writing SCHEMA/RECORD/STATE lines to stdout
    Sync {
        /// Streams to sync (comma-separated, empty = config or all)
        #[arg(long)]
        streams: Option<String>,
    },
}

impl Cli {
    /// Log filter directive for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
