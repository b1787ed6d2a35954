//! `seek show` command
//!
//! Exact-key lookup, no embedding involved.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use crate::config::Config;
use crate::core::VectorStore;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Key of the document
    pub service_key: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ShowArgs, config: &Config) -> Result<()> {
    let db_path = config.database_path();
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'seek init' first.",
            db_path.display()
        );
    }
    let store = VectorStore::open(&db_path, config.database.dimension)?;

    let doc = match store.get(args.service_key.trim())? {
        Some(doc) => doc,
        None => bail!("No document for service_key '{}'", args.service_key),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{} {}", "##".dimmed(), doc.service_key.cyan().bold());
    println!("   id: {}", doc.id);
    println!("   created: {}", doc.created_at.to_rfc3339());
    println!("   updated: {}", doc.updated_at.to_rfc3339());
    if let Some(metadata) = &doc.metadata {
        println!("   metadata: {}", serde_json::to_string(metadata)?);
    }
    println!("\n{}", "Content".bold());
    println!("{}", doc.content);

    Ok(())
}
