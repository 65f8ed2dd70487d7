//! CLI command definitions for blog-import
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod import;
pub mod report;
pub mod setup;
pub mod validate;

use clap::{Parser, Subcommand};
use import::ImportArgs;
use setup::SetupArgs;
use validate::ValidateArgs;

/// Merge a blog content export into a destination database
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import a content export into the destination
    Import(ImportArgs),

    /// Sanitize and validate a content export without writing anything
    Validate(ValidateArgs),

    /// Create the destination owner account
    Setup(SetupArgs),
}
