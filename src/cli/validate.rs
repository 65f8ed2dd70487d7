//! Validate subcommand: sanitize and check an export without a destination.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the validate subcommand
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the export file to check
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print problems and errors as JSON
    #[arg(long)]
    pub json: bool,
}
