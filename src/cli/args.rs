//! CLI argument definitions using clap
//!
//! Commands:
//! - rangekv explain --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rangekv - follower-read diagnostics for a replicated range store
#[derive(Parser, Debug)]
#[command(name = "rangekv")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate follower-read eligibility for a scenario read from stdin
    Explain {
        /// Path to configuration file
        #[arg(long, default_value = "./rangekv.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
