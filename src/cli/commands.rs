//! CLI command implementations
//!
//! Both commands open an in-memory database from the config file. `query`
//! loads the optional data file into it, runs the pipeline and prints each
//! result document; `explain` prints the plan without touching storage.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::args::{Cli, Command, QueryArgs};
use super::errors::{CliError, CliResult};
use super::io::{parse_pipeline, read_data, write_line};
use crate::collection::Db;
use crate::config::DbConfig;
use crate::cursor::Cursor;
use crate::observability::{Logger, Severity};
use crate::storage::MemoryStorage;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    if cli.verbose {
        Logger::set_min_severity(Severity::Trace);
    }
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Query { query: args, data } => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| {
                    CliError::runtime_failed(format!("Failed to create tokio runtime: {}", e))
                })?;
            let results = rt.block_on(query(&args, data.as_deref()))?;
            for document in results {
                write_line(&document)?;
            }
            Ok(())
        }
        Command::Explain { query: args } => write_line(&explain(&args)?),
    }
}

fn open_db(config_path: &Path) -> CliResult<Db> {
    let config = DbConfig::load(config_path)?;
    Ok(Db::open(&config, Arc::new(MemoryStorage::new()))?)
}

fn build_cursor(db: &Db, args: &QueryArgs) -> CliResult<Cursor> {
    let collection = db.collection(&args.collection)?;
    let stages = parse_pipeline(&args.pipeline)?;
    let mut cursor = collection.aggregate(&stages)?;
    if let Some(hint) = &args.hint {
        cursor.hint(hint)?;
    }
    Ok(cursor)
}

/// Execute a pipeline and collect its results
pub async fn query(args: &QueryArgs, data: Option<&Path>) -> CliResult<Vec<Value>> {
    let db = open_db(&args.config)?;

    if let Some(path) = data {
        for (name, documents) in read_data(path)? {
            db.collection(&name)?.insert(documents).await?;
        }
    }

    let mut cursor = build_cursor(&db, args)?;
    let documents = cursor.drain_all().await?;
    Ok(documents.into_iter().map(Value::Object).collect())
}

/// Plan a pipeline without running it
pub fn explain(args: &QueryArgs) -> CliResult<Value> {
    let db = open_db(&args.config)?;
    let cursor = build_cursor(&db, args)?;
    Ok(cursor.explain()?)
}
