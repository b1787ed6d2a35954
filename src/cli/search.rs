//! `seek search` command
//!
//! # Usage
//! ```bash
//! seek search "who handles refunds"
//! seek search "refunds" -k 3 --threshold 0.5
//! seek search "refunds" --key payments --format json
//! ```

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::config::Config;
use crate::knowledge::{Knowledge, Outcome, SearchHit, SearchOptions, DEFAULT_K};

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Natural-language query
    pub query: String,

    /// Maximum results
    #[arg(short, long, default_value_t = DEFAULT_K)]
    pub k: i64,

    /// Minimum similarity (0.0-1.0)
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Only consider this exact key
    #[arg(long)]
    pub key: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "score")]
    similarity: String,
    #[tabled(rename = "key")]
    service_key: String,
    id: i64,
    content: String,
}

impl From<&SearchHit> for Row {
    fn from(hit: &SearchHit) -> Self {
        Self {
            similarity: format!("{:.4}", hit.similarity),
            service_key: hit.service_key.clone(),
            id: hit.id,
            content: excerpt(&hit.content, 60),
        }
    }
}

pub fn run(args: SearchArgs, config: &Config) -> Result<()> {
    let knowledge = Knowledge::from_config(config)?;
    let options = SearchOptions {
        k: args.k,
        threshold: args.threshold,
        service_key: args.key.as_deref(),
    };
    let outcome = knowledge.search.search(&args.query, &options)?;

    match (&args.format, &outcome) {
        (OutputFormat::Json, _) => println!("{}", serde_json::to_string_pretty(&outcome)?),
        (OutputFormat::Table, Outcome::Success(report)) => print_table(&report.results),
        (OutputFormat::Table, Outcome::Failure(_)) => {}
    }

    if let Some(failure) = outcome.failure() {
        bail!("{}", failure.message);
    }
    Ok(())
}

fn print_table(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results found.");
        return;
    }

    println!("\n📚 Found {} result(s):\n", hits.len().to_string().bold());
    let rows: Vec<Row> = hits.iter().map(Row::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

/// First `max` chars on one line
fn excerpt(content: &str, max: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}
