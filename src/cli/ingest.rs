//! `seek ingest` command
//!
//! # Usage
//! ```bash
//! seek ingest payments "Handles card payments and refunds"
//! seek ingest payments "..." --metadata '{"team": "billing"}'
//! ```

use anyhow::Result;
use clap::Args;

use super::{parse_metadata, print_outcome};
use crate::config::Config;
use crate::knowledge::Knowledge;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Unique key of the document
    pub service_key: String,

    /// Text to embed and store
    pub content: String,

    /// Metadata as a JSON object
    #[arg(short, long)]
    pub metadata: Option<String>,
}

pub fn run(args: IngestArgs, config: &Config) -> Result<()> {
    let metadata = parse_metadata(args.metadata.as_deref())?;
    let knowledge = Knowledge::from_config(config)?;
    let outcome = knowledge
        .ingest
        .ingest(&args.service_key, &args.content, metadata.as_ref())?;
    print_outcome(&outcome)
}
