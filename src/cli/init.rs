//! `seek init` command
//!
//! Creates `.seek/config.toml` and provisions the database.
//!
//! # Usage
//! ```bash
//! seek init                    # Initialize in current directory
//! seek init /path/to/project   # Initialize in specific path
//! seek init --force            # Overwrite an existing config
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;

use crate::config::{Config, CONFIG_FILE, DATABASE_FILE, SEEK_DIR};
use crate::core::VectorStore;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to initialize (default: current directory)
    pub path: Option<PathBuf>,

    /// Force re-initialization
    #[arg(short, long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let base_path = args.path.unwrap_or_else(|| PathBuf::from("."));
    let seek_dir = base_path.join(SEEK_DIR);
    let config_path = seek_dir.join(CONFIG_FILE);

    if is_initialized(&base_path) && !args.force {
        bail!(
            "Directory {} is already initialized. Use --force to reinitialize.",
            base_path.display()
        );
    }

    println!("🚀 Initializing seek in: {}", base_path.display());

    let config = Config::default();
    config.save_to(&config_path)?;

    let db_path = seek_dir.join(DATABASE_FILE);
    let store = VectorStore::open(&db_path, config.database.dimension)?;

    println!("\n✅ Initialized seek");
    println!("   Config: {}", config_path.display());
    println!("   Database: {} ({} dimensions)", db_path.display(), store.dimension());
    println!("\nNext steps:");
    println!("  export OPENAI_API_KEY=...");
    println!("  seek ingest my-service \"What my-service does\"");
    println!("  seek search \"query\"");

    Ok(())
}

/// Check if a directory already has a seek config
fn is_initialized(path: &Path) -> bool {
    path.join(SEEK_DIR).join(CONFIG_FILE).exists()
}
