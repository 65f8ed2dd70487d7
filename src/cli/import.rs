//! Import subcommand for blog-import CLI
//!
//! Merges a content export into the destination database.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the import subcommand
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to the export file to import (`.json` or gzipped)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Run the whole import, then roll it back
    ///
    /// Reports exactly what would be written and which problems would be
    /// raised, without changing the destination.
    #[arg(long)]
    pub dry_run: bool,

    /// Email of the destination user performing the import
    ///
    /// New rows are stamped with this user's id. Defaults to the owner.
    #[arg(long = "as", value_name = "EMAIL")]
    pub acting_as: Option<String>,

    /// Print the full import result as JSON
    #[arg(long)]
    pub json: bool,
}

impl ImportArgs {
    /// Describe the import mode for logging
    pub fn import_mode(&self) -> &'static str {
        if self.dry_run { "dry-run" } else { "commit" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_mode() {
        let args = ImportArgs {
            file: PathBuf::from("export.json"),
            dry_run: true,
            acting_as: None,
            json: false,
        };
        assert_eq!(args.import_mode(), "dry-run");

        let args = ImportArgs {
            file: PathBuf::from("export.json"),
            dry_run: false,
            acting_as: None,
            json: false,
        };
        assert_eq!(args.import_mode(), "commit");
    }
}
