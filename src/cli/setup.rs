//! Setup subcommand: create the owner of an empty destination.

use clap::Args;

/// Arguments for the setup subcommand
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Display name of the owner
    #[arg(long)]
    pub name: String,

    /// Login email of the owner
    #[arg(long)]
    pub email: String,

    /// Pre-computed password hash; login stays blocked until one is set
    #[arg(long)]
    pub password_hash: Option<String>,
}
