//! CLI module - Command definitions and handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::core::Metadata;
use crate::knowledge::Outcome;

pub mod import;
pub mod ingest;
pub mod init;
pub mod search;
pub mod serve;
pub mod show;
pub mod update;

/// seek - semantic knowledge store
///
/// Stores text documents by key, embeds them and finds them again by meaning.
#[derive(Parser, Debug)]
#[command(name = "seek")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "SEEK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new seek directory
    Init(init::InitArgs),

    /// Start the MCP server on stdio
    Serve(serve::ServeArgs),

    /// Store a new document
    Ingest(ingest::IngestArgs),

    /// Replace a document, creating it if absent
    Update(update::UpdateArgs),

    /// Search documents by meaning
    Search(search::SearchArgs),

    /// Show the document stored under a key
    Show(show::ShowArgs),

    /// Ingest documents from a JSON Lines file
    Import(import::ImportArgs),
}

/// Parse `--metadata`; must be a JSON object
pub(crate) fn parse_metadata(raw: Option<&str>) -> Result<Option<Metadata>> {
    raw.map(|text| {
        serde_json::from_str::<Metadata>(text).context("--metadata must be a JSON object")
    })
    .transpose()
}

/// Print the envelope as pretty JSON; a failure envelope also fails the command
pub(crate) fn print_outcome<T: Serialize>(outcome: &Outcome<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    if let Some(failure) = outcome.failure() {
        bail!("{}", failure.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() -> Result<()> {
        assert!(parse_metadata(None)?.is_none());
        let metadata = parse_metadata(Some(r#"{"team": "core", "tier": 1}"#))?;
        assert_eq!(metadata.map(|m| m.len()), Some(2));
        assert!(parse_metadata(Some("[1, 2]")).is_err());
        assert!(parse_metadata(Some("{oops")).is_err());
        Ok(())
    }

    #[test]
    fn test_cli_parses_search_flags() -> Result<()> {
        let cli = Cli::try_parse_from([
            "seek", "search", "retry policy", "-k", "3", "--threshold", "0.4", "--key", "svc",
            "--format", "json",
        ])?;
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "retry policy");
                assert_eq!(args.k, 3);
                assert_eq!(args.threshold, Some(0.4));
                assert_eq!(args.key.as_deref(), Some("svc"));
                assert!(matches!(args.format, search::OutputFormat::Json));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
