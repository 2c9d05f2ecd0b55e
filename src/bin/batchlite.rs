use batchlite::config::{self, Config};
use batchlite::core::db::{Database, RowSet};
use batchlite::core::{BatchliteError, Result};
use batchlite::import::rowset_from_json;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: batchlite [--config <file>] [--auto <column>]... <db-path> [<table> <rows.json>]";

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<String>,
    auto_columns: Vec<String>,
    positional: Vec<String>,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> std::result::Result<Args, String> {
    let mut args = Args::default();
    let mut iter = raw.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                args.config = Some(iter.next().ok_or("--config requires a file path")?);
            }
            "--auto" => {
                args.auto_columns.push(iter.next().ok_or("--auto requires a column name")?);
            }
            flag if flag.starts_with("--") => return Err(format!("Unknown option {}", flag)),
            _ => args.positional.push(arg),
        }
    }
    match args.positional.len() {
        1 | 3 => Ok(args),
        _ => Err("Expected a database path, optionally followed by a table and a JSON file".to_string()),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(p) => config::load_config(p),
        None => match config::default_config_path() {
            Some(default) if default.exists() => {
                debug!("Using config file {}", default.display());
                config::load_config(default)
            }
            _ => Ok(Config::default()),
        },
    }
}

/// Auto-generated columns the destination table declares, if it exists
fn table_auto_columns(db: &Database, table: &str) -> Result<Vec<String>> {
    let session = db.open_session()?;
    match RowSet::for_table(&session, table) {
        Ok(shape) => Ok(shape
            .columns()
            .iter()
            .filter(|c| c.auto_generated)
            .map(|c| c.name.clone())
            .collect()),
        Err(BatchliteError::InvalidInput(_)) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

fn run(args: Args) -> Result<bool> {
    let config = load_config(args.config.as_deref())?;
    let db = Database::new(config.connection_config(Some(args.positional[0].as_str()))?)
        .with_batch_options(config.batch_options()?);

    if args.positional.len() == 1 {
        let ok = db.test_connection();
        if ok {
            println!("Connection to {} OK", db.config().path);
        } else {
            eprintln!("Could not connect to {}", db.config().path);
        }
        return Ok(ok);
    }

    let table = &args.positional[1];
    let text = std::fs::read_to_string(&args.positional[2])?;

    let mut auto_columns = table_auto_columns(&db, table)?;
    auto_columns.extend(args.auto_columns.iter().cloned());
    let auto_refs: Vec<&str> = auto_columns.iter().map(String::as_str).collect();

    let rows = rowset_from_json(&text, &auto_refs)?;
    let report = db.batch_insert(table, &rows)?;
    println!(
        "Inserted {} rows into {} ({} transaction(s))",
        report.rows_inserted, table, report.chunks_committed
    );
    Ok(true)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}\n{}", msg, USAGE);
            return ExitCode::from(2);
        }
    };
    info!("Starting batchlite...");

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
