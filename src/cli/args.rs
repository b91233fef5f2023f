//! CLI argument definitions using clap
//!
//! Commands:
//! - fieldgate compile --schema <path> [--config <path>]
//! - fieldgate translate
//! - fieldgate paths
//! - fieldgate check --config <path> --model <name>
//! - fieldgate apply [--version-key <name>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fieldgate - field-level access control for document stores
#[derive(Parser, Debug)]
#[command(name = "fieldgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a schema file and print its path access index
    Compile {
        /// Path to the schema file
        #[arg(long)]
        schema: PathBuf,

        /// Configuration file supplying access defaults
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Translate a portable filter read from stdin
    Translate,

    /// Extract the paths touched by a filter or update read from stdin
    Paths,

    /// Validate a request read from stdin against a model's index
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./fieldgate.json")]
        config: PathBuf,

        /// Schema name
        #[arg(long)]
        model: String,
    },

    /// Apply an update command to a document read from stdin
    Apply {
        /// Version counter field protected from $set
        #[arg(long, default_value = "__v")]
        version_key: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
