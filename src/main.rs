//! seek CLI - Entry point
//!
//! Usage: seek <command> [options]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use seek::cli::{Cli, Commands};
use seek::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries protocol frames in `serve`
    let filter = log_filter(cli.verbose, std::env::var("RUST_LOG").ok().as_deref())?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = || Config::load(cli.config.as_deref());
    match cli.command {
        Commands::Init(args) => seek::cli::init::run(args),
        Commands::Serve(args) => seek::cli::serve::run(args, config()?),
        Commands::Ingest(args) => seek::cli::ingest::run(args, &config()?),
        Commands::Update(args) => seek::cli::update::run(args, &config()?),
        Commands::Search(args) => seek::cli::search::run(args, &config()?),
        Commands::Show(args) => seek::cli::show::run(args, &config()?),
        Commands::Import(args) => seek::cli::import::run(args, &config()?),
    }
}

/// `RUST_LOG` (default `info`), with `-v` adding `seek=debug` on top
fn log_filter(verbose: bool, rust_log: Option<&str>) -> Result<EnvFilter> {
    let mut filter = rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    if verbose {
        filter = filter.add_directive("seek=debug".parse()?);
    }
    Ok(filter)
}
