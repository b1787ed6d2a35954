//! `seek import` command
//!
//! Batch ingest from JSON Lines. Each non-blank line is an object with
//! `service_name` (or `service_key`), `content` and optional `metadata`.
//!
//! # Usage
//! ```bash
//! seek import services.jsonl
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::Config;
use crate::knowledge::{IngestItem, Knowledge, Outcome};

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON Lines file to read
    pub file: PathBuf,
}

pub fn run(args: ImportArgs, config: &Config) -> Result<()> {
    let items = read_items(&args.file)?;
    if items.is_empty() {
        println!("Nothing to import.");
        return Ok(());
    }

    let knowledge = Knowledge::from_config(config)?;
    let outcomes = knowledge.ingest.ingest_batch(&items)?;

    let mut failed = 0;
    for (item, outcome) in items.iter().zip(&outcomes) {
        match outcome {
            Outcome::Success(report) => {
                println!("{} {} (id {})", "✓".green(), report.service_key, report.id)
            }
            Outcome::Failure(failure) => {
                failed += 1;
                println!("{} {}: {}", "✗".red(), item.service_key, failure.error);
            }
        }
    }

    println!(
        "\n{} imported, {} failed",
        (outcomes.len() - failed).to_string().green().bold(),
        failed
    );

    if failed > 0 {
        bail!("{} of {} documents failed to import", failed, outcomes.len());
    }
    Ok(())
}

fn read_items(path: &Path) -> Result<Vec<IngestItem>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid entry", path.display(), index + 1))
        })
        .collect()
}
