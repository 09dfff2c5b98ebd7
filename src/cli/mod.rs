//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Commands
//!
//! - `discover` - Print the stream catalog
//! - `streams` - List stream names
//! - `sync` - Extract records as Singer-style JSON lines

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
