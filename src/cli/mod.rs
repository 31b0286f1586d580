//! CLI module for ArborDB
//!
//! Provides command-line interface for:
//! - checkin: check in one node of a content file
//! - freeze: build a frozen snapshot of one node in a given mode

mod args;
mod commands;
mod config;
mod errors;
mod import;
mod io;

pub use args::{Cli, Command};
pub use commands::{checkin, freeze, run_command};
pub use config::Config;
pub use errors::{CliError, CliErrorCode, CliResult};
pub use import::{create_version_histories, import, property_state, Content, ContentNode, DefinitionRules};
pub use io::{write_error, write_response};

/// Parses arguments and runs the command. Errors are also reported as a
/// JSON error object on stdout.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(err) => {
            // stdout may be gone; the caller still reports `err`
            let _ = write_error(err.code_str(), err.message());
            Err(err)
        }
    }
}
