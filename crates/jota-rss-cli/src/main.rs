use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jota_rss_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "jota-rss")]
#[command(author, version, about = "Generates RSS feeds from JOTA tag pages")]
#[command(group(ArgGroup::new("tag_source").args(["tags", "tags_file", "tags_env"])))]
struct Cli {
    /// Tags to scrape, e.g. `--tags itcmd stf`
    #[arg(long, num_args = 1..)]
    tags: Vec<String>,

    /// File with one tag per line
    #[arg(long)]
    tags_file: Option<PathBuf>,

    /// Environment variable holding comma-separated tags
    #[arg(long)]
    tags_env: Option<String>,

    /// Directory the feeds are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Listing pages fetched per tag
    #[arg(short = 'p', long)]
    max_pages: Option<u32>,

    /// Configuration file (defaults to ~/.config/jota-rss/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.output_dir = dir;
    }
    if let Some(max_pages) = cli.max_pages {
        config.output.max_pages = max_pages;
    }

    let source = commands::generate::TagSource::from_args(cli.tags, cli.tags_file, cli.tags_env);
    commands::generate::run(&config, source).await
}
