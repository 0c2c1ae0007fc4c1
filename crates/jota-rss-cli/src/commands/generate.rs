use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;

use jota_rss_core::{
    tags::{load_tags_from_env, load_tags_from_file},
    AppConfig, Pipeline,
};

/// Where the tag list comes from; the config file is the fallback
#[derive(Debug, PartialEq)]
pub enum TagSource {
    List(Vec<String>),
    File(PathBuf),
    Env(String),
    Config,
}

impl TagSource {
    pub fn from_args(tags: Vec<String>, file: Option<PathBuf>, env: Option<String>) -> Self {
        if !tags.is_empty() {
            TagSource::List(tags)
        } else if let Some(path) = file {
            TagSource::File(path)
        } else if let Some(var) = env {
            TagSource::Env(var)
        } else {
            TagSource::Config
        }
    }

    pub fn resolve(self, config: &AppConfig) -> Result<Vec<String>> {
        let tags = match self {
            TagSource::List(tags) => tags,
            TagSource::File(path) => load_tags_from_file(&path)?,
            TagSource::Env(var) => load_tags_from_env(&var),
            TagSource::Config => config.output.tags.clone(),
        };
        Ok(tags)
    }
}

pub async fn run(config: &AppConfig, source: TagSource) -> Result<ExitCode> {
    let tags = source.resolve(config)?;
    if tags.is_empty() {
        eprintln!("No tags given. Use --tags, --tags-file, --tags-env or output.tags in the config file.");
        return Ok(ExitCode::from(2));
    }

    let output_dir = &config.output.output_dir;
    println!(
        "Generating feeds for {} tags into {}...\n",
        tags.len(),
        output_dir.display()
    );

    let pipeline = Pipeline::from_config(config)?;
    let report = pipeline
        .run(&tags, output_dir, config.output.max_pages)
        .await?;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(success) => println!(
                "  ✓ {}: {} articles from {} pages -> {}",
                outcome.tag,
                success.articles,
                success.pages_fetched,
                success.path.display()
            ),
            Err(failure) => println!("  ✗ {}: {}", outcome.tag, failure),
        }
    }

    let failed = report.failed().count();
    println!(
        "\n{} of {} tags succeeded. Combined feed: {} articles -> {}",
        report.outcomes.len() - failed,
        report.outcomes.len(),
        report.combined_articles,
        report.combined_path.display()
    );

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}
