//! CLI argument definitions using clap
//!
//! Commands:
//! - aeroquery query --config <path> --data <path> --collection <name> --pipeline <json>
//! - aeroquery explain --config <path> --collection <name> --pipeline <json>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// aeroquery - run query pipelines against a JSON data set
#[derive(Parser, Debug)]
#[command(name = "aeroquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log planning and iteration events to stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Path to configuration file
    #[arg(long, default_value = "./aeroquery.json")]
    pub config: PathBuf,

    /// Collection to query
    #[arg(long)]
    pub collection: String,

    /// Aggregation pipeline as a JSON array of stage documents
    #[arg(long, default_value = "[]")]
    pub pipeline: String,

    /// Index path to restrict planning to
    #[arg(long)]
    pub hint: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load data, run a pipeline and print each result as a JSON line
    Query {
        #[command(flatten)]
        query: QueryArgs,

        /// Data file: a JSON object mapping collection names to document arrays
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Print the execution plan of a pipeline without running it
    Explain {
        #[command(flatten)]
        query: QueryArgs,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
