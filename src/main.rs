//! blog-import
//!
//! Merges a blog content export into a live destination database.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tracing::info;

use blog_import::cli::import::ImportArgs;
use blog_import::cli::setup::SetupArgs;
use blog_import::cli::validate::ValidateArgs;
use blog_import::cli::{Cli, Command, report};
use blog_import::config::{Config, ConfigLoader};
use blog_import::db::Database;
use blog_import::engine::{ImportContext, ImportOptions, Importer, preflight};
use blog_import::error::ImportError;
use blog_import::logging;
use blog_import::snapshot::Snapshot;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&cli.log, cli.verbose)?;

    let mut loader = match &cli.config {
        Some(path) => ConfigLoader::load_file(Path::new(path))?,
        None => ConfigLoader::load()?,
    };
    if let Some(db_path) = &cli.database {
        loader.config_mut().database.path = db_path.into();
    }
    let config = loader.into_config();

    match cli.command {
        Command::Import(args) => run_import(&config, args),
        Command::Validate(args) => run_validate(args),
        Command::Setup(args) => run_setup(&config, args),
    }
}

fn open_database(config: &Config) -> Result<Database> {
    let path = &config.database.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }
    Database::open(path).with_context(|| format!("open database {}", path.display()))
}

fn run_import(config: &Config, args: ImportArgs) -> Result<ExitCode> {
    let snapshot = Snapshot::from_file(&args.file)?;
    let db = open_database(config)?;

    let ctx = match &args.acting_as {
        Some(email) => ImportContext::as_user(&db, email)?,
        None => ImportContext::as_owner(&db)?,
    };
    info!(
        file = %args.file.display(),
        mode = args.import_mode(),
        acting_user = %ctx.acting_user_id,
        "starting import"
    );

    let options = ImportOptions {
        dry_run: args.dry_run,
    };
    let mut importer = Importer::new(config.import.clone());
    let mut stdout = std::io::stdout().lock();

    match importer.run(&db, snapshot, &ctx, &options) {
        Ok(result) => {
            if args.json {
                serde_json::to_writer_pretty(&mut stdout, &result)?;
                writeln!(stdout)?;
            } else {
                report::render_import(&result, &mut stdout)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(ImportError::Validation(errors)) => {
            if args.json {
                serde_json::to_writer_pretty(&mut stdout, &errors)?;
                writeln!(stdout)?;
            } else {
                report::render_errors(&errors, &mut stdout)?;
            }
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn run_validate(args: ValidateArgs) -> Result<ExitCode> {
    let snapshot = Snapshot::from_file(&args.file)?;
    let preflight = preflight(snapshot);
    let mut stdout = std::io::stdout().lock();

    if args.json {
        let body = serde_json::json!({
            "valid": preflight.errors().is_empty(),
            "errors": preflight.errors(),
            "problems": preflight.sanitized.problems,
        });
        serde_json::to_writer_pretty(&mut stdout, &body)?;
        writeln!(stdout)?;
    } else {
        report::render_preflight(&preflight, &mut stdout)?;
    }

    Ok(if preflight.errors().is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_setup(config: &Config, args: SetupArgs) -> Result<ExitCode> {
    let db = open_database(config)?;
    let id = db.create_owner(&args.name, &args.email, args.password_hash.as_deref())?;
    println!("Created owner {} <{}> ({})", args.name, args.email, id);
    Ok(ExitCode::SUCCESS)
}
