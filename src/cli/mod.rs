//! CLI module for rangekv
//!
//! Provides command-line interface for:
//! - explain: One-shot follower-read eligibility check

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{evaluate, explain, run, run_command, Scenario};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
