//! Main CLI parser and top-level argument handling.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for inspecting shark databases.
#[derive(Debug, Parser)]
#[command(name = "shark")]
#[command(about = "Inspect shark SQLite databases")]
#[command(version)]
pub struct Cli {
    /// Database file to open instead of the configured default
    #[arg(long = "db", global = true, env = "SHARK_DB")]
    pub db: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// List the tables in the database
    Tables,

    /// Show the columns of a table
    Describe {
        /// Table name
        table: String,
    },

    /// Run a SQL statement and print its rows as tab-separated values
    Query {
        /// SQL text
        sql: String,
    },
}
