//! Command-line interface for fieldgate
//!
//! Provides commands for:
//! - compile: Compile a schema file into its path access index
//! - translate: Translate a portable filter into native operators
//! - paths: List the paths a filter or update touches
//! - check: Validate a request against a model at given access levels
//! - apply: Apply an update command to a document

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{
    apply_request, check_request, compile, paths_request, run, run_command, translate_request,
};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_request, read_request, write_error, write_response};
