//! Serve command - Start MCP server

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::Config;

/// Start MCP server for AI integration
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Directory of `<tool>.json` schema documents (default: bundled)
    #[arg(long)]
    pub schema_dir: Option<PathBuf>,
}

pub fn run(args: ServeArgs, mut config: Config) -> Result<()> {
    if let Some(dir) = args.schema_dir {
        config.tools.schema_dir = Some(dir);
    }

    eprintln!("🚀 Starting MCP server (transport: stdio)");
    eprintln!("📂 Database: {}", config.database_path().display());

    crate::mcp::run_mcp_server(&config)
}
