//! CLI argument definitions using clap
//!
//! Commands:
//! - arbordb checkin --config <path> --content <path> --path <node path>
//! - arbordb freeze --config <path> --content <path> --path <node path> [--mode <mode>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::version::CheckinMode;

/// ArborDB - versioning engine for hierarchical content
#[derive(Parser, Debug)]
#[command(name = "arbordb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import content, check in one versionable node, print the new version
    Checkin {
        /// Path to configuration file
        #[arg(long, default_value = "./arbordb.json")]
        config: PathBuf,

        /// Path to JSON content file
        #[arg(long)]
        content: PathBuf,

        /// Absolute path of the node to check in
        #[arg(long)]
        path: String,
    },

    /// Import content and print the frozen snapshot of one node
    Freeze {
        /// Path to configuration file
        #[arg(long, default_value = "./arbordb.json")]
        config: PathBuf,

        /// Path to JSON content file
        #[arg(long)]
        content: PathBuf,

        /// Absolute path of the node to freeze
        #[arg(long)]
        path: String,

        /// init, versioned, copy or copy_recursive
        #[arg(long, default_value = "versioned")]
        mode: CheckinMode,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
