//! `seek update` command
//!
//! Replaces content, embedding and metadata of a key; creates it if absent.

use anyhow::Result;
use clap::Args;

use super::{parse_metadata, print_outcome};
use crate::config::Config;
use crate::knowledge::Knowledge;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Key of the document to replace
    pub service_key: String,

    /// New text
    pub content: String,

    /// New metadata as a JSON object (omitting it clears stored metadata)
    #[arg(short, long)]
    pub metadata: Option<String>,
}

pub fn run(args: UpdateArgs, config: &Config) -> Result<()> {
    let metadata = parse_metadata(args.metadata.as_deref())?;
    let knowledge = Knowledge::from_config(config)?;
    let outcome = knowledge
        .update
        .update(&args.service_key, &args.content, metadata.as_ref())?;
    print_outcome(&outcome)
}
