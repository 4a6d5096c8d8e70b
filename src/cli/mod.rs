//! CLI module for aeroquery
//!
//! Provides command-line interface for:
//! - query: load a data file, run a pipeline, print JSON lines
//! - explain: print the execution plan of a pipeline

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, QueryArgs};
pub use commands::{explain, query, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{parse_pipeline, read_data, write_line};
