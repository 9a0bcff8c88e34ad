//! Command handlers. Each returns the text to print.

use anyhow::{Result, bail};
use shark_core::{RawResults, Settings, Value};
use shark_db::{DateEncoding, Shark, open_database_at, setup_database};

use crate::parser::{Cli, Commands};

/// Opens the database selected by `--db`, or the configured default.
pub async fn open(cli: &Cli, settings: &Settings) -> Result<Shark> {
    tracing::debug!(db = ?cli.db, "opening database");
    let pool = match &cli.db {
        Some(path) => open_database_at(path, settings.journal_mode).await?,
        None => setup_database(settings).await?,
    };
    Ok(Shark::from_pool(
        pool,
        DateEncoding::from_settings(settings.use_epoch_dates),
    ))
}

/// Runs the parsed command against `shark`.
pub async fn run(command: &Commands, shark: &Shark) -> Result<String> {
    match command {
        Commands::Tables => {
            let mut out = String::new();
            for table in shark.table_names().await? {
                out.push_str(&table);
                out.push('\n');
            }
            Ok(out)
        }
        Commands::Describe { table } => describe(shark, table).await,
        Commands::Query { sql } => Ok(format_tsv(&shark.raw_query(sql).await?)),
    }
}

async fn describe(shark: &Shark, table: &str) -> Result<String> {
    let sql = format!(
        "SELECT name, type, dflt_value, pk FROM pragma_table_info({})",
        quote_literal(table)
    );
    let info = shark.raw_query(&sql).await?;
    if info.row_count() == 0 {
        bail!("no such table: {table}");
    }
    Ok(format_tsv(&info))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn escape_cell(value: &Value) -> String {
    value
        .to_string()
        .replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
}

/// Header line followed by one line per row, cells separated by tabs.
pub fn format_tsv(results: &RawResults) -> String {
    let mut out = String::new();
    if results.columns.is_empty() {
        return out;
    }
    out.push_str(&results.columns.join("\t"));
    out.push('\n');
    for row in &results.rows {
        let cells: Vec<String> = row.iter().map(escape_cell).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}
