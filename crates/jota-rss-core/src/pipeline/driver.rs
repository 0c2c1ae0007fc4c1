use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;

use super::aggregate::TagAggregator;
use super::site::Site;
use crate::config::AppConfig;
use crate::error::TagFailure;
use crate::feed::{render, CombinedFeed, Extractor, PageFetcher, TagFeed};
use crate::tags::dedup_tags;
use crate::{Error, Result};

const DEFAULT_TAG_CONCURRENCY: usize = 4;
const DEFAULT_COMBINED_FILENAME: &str = "feed.xml";

/// A feed file written for one tag
#[derive(Debug, Clone)]
pub struct TagSuccess {
    pub path: PathBuf,
    pub articles: usize,
    pub pages_fetched: u32,
}

#[derive(Debug)]
pub struct TagOutcome {
    pub tag: String,
    pub result: std::result::Result<TagSuccess, TagFailure>,
}

/// What a run produced, tags in input order
#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<TagOutcome>,
    pub combined_path: PathBuf,
    pub combined_articles: usize,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &TagSuccess)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|s| (o.tag.as_str(), s)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &TagFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|f| (o.tag.as_str(), f)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Scrapes every tag and writes one feed per tag plus the combined feed
pub struct Pipeline {
    aggregator: Arc<TagAggregator>,
    tag_concurrency: usize,
    combined_filename: String,
    label_combined_items: bool,
}

impl Pipeline {
    pub fn new(aggregator: TagAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            tag_concurrency: DEFAULT_TAG_CONCURRENCY,
            combined_filename: DEFAULT_COMBINED_FILENAME.to_string(),
            label_combined_items: false,
        }
    }

    /// Pipeline backed by the HTTP fetcher, configured from `config`
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let fetcher = PageFetcher::new(&config.fetch)?;
        let aggregator = TagAggregator::new(
            Arc::new(fetcher),
            Arc::new(Extractor::new()?),
            Site::from_config(&config.site)?,
        );

        Ok(Self::new(aggregator)
            .with_tag_concurrency(config.output.tag_concurrency)
            .with_combined_filename(config.output.combined_filename.clone())
            .with_labelled_combined_items(config.output.label_combined_items))
    }

    pub fn with_tag_concurrency(mut self, concurrency: usize) -> Self {
        self.tag_concurrency = concurrency.max(1);
        self
    }

    pub fn with_combined_filename(mut self, filename: impl Into<String>) -> Self {
        self.combined_filename = filename.into();
        self
    }

    /// Prefix combined feed titles with `[TAG]`
    pub fn with_labelled_combined_items(mut self, label: bool) -> Self {
        self.label_combined_items = label;
        self
    }

    /// Run the whole pipeline.
    ///
    /// A failing tag is reported and does not stop the others. Only an
    /// unusable output directory or a failed combined-feed write is an error.
    pub async fn run(&self, tags: &[String], output_dir: &Path, max_pages: u32) -> Result<RunReport> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| Error::Write {
                path: output_dir.to_path_buf(),
                source,
            })?;

        let tags = dedup_tags(tags);
        tracing::info!("Generating feeds for {} tags: {:?}", tags.len(), tags);

        let mut results = self.aggregate_all(&tags, max_pages).await;

        let site = self.aggregator.site();
        let mut outcomes = Vec::with_capacity(tags.len());
        let mut feeds: Vec<TagFeed> = Vec::new();

        for (index, tag) in tags.into_iter().enumerate() {
            let aggregated = results[index].take().unwrap_or_else(|| {
                Err(Error::Other("aggregation task did not complete".to_string()))
            });

            let result = match aggregated {
                Err(e) => Err(TagFailure::Fatal(e)),
                Ok(feed) if feed.is_empty() => Err(match feed.stopped_by {
                    Some(e) => TagFailure::Fetch(e),
                    None => TagFailure::Empty,
                }),
                Ok(feed) => {
                    let path = output_dir.join(format!("{}.xml", tag));
                    let written = match site.tag_channel(&tag) {
                        Ok(channel) => match render(&channel, &feed.articles) {
                            Ok(xml) => write_feed(&path, &xml).await,
                            Err(e) => Err(e),
                        },
                        Err(e) => Err(e),
                    };

                    let result = match written {
                        Ok(()) => Ok(TagSuccess {
                            path,
                            articles: feed.articles.len(),
                            pages_fetched: feed.pages_fetched,
                        }),
                        Err(e) => {
                            tracing::error!("Failed to write feed for tag {}: {}", tag, e);
                            Err(TagFailure::Write(e))
                        }
                    };
                    feeds.push(feed);
                    result
                }
            };

            if let Err(ref failure) = result {
                tracing::warn!("Tag {} failed: {}", tag, failure);
            }
            outcomes.push(TagOutcome { tag, result });
        }

        let combined = if self.label_combined_items {
            CombinedFeed::from_tag_feeds_labelled(&feeds)
        } else {
            CombinedFeed::from_tag_feeds(&feeds)
        };
        let combined_path = output_dir.join(&self.combined_filename);
        let xml = render(&site.combined_channel(), &combined.articles)?;
        write_feed(&combined_path, &xml).await?;

        let report = RunReport {
            outcomes,
            combined_path,
            combined_articles: combined.len(),
        };
        tracing::info!(
            "Done. {} of {} tags succeeded, {} articles in combined feed",
            report.succeeded().count(),
            report.outcomes.len(),
            report.combined_articles
        );

        Ok(report)
    }

    /// Aggregate every tag with at most `tag_concurrency` tags in flight.
    /// Slot `i` holds the result for `tags[i]`; `None` if its task died.
    async fn aggregate_all(&self, tags: &[String], max_pages: u32) -> Vec<Option<Result<TagFeed>>> {
        let mut results: Vec<Option<Result<TagFeed>>> = tags.iter().map(|_| None).collect();
        let mut join_set: JoinSet<(usize, Result<TagFeed>)> = JoinSet::new();
        let mut pending = tags.iter().cloned().enumerate();

        fn spawn_task(
            join_set: &mut JoinSet<(usize, Result<TagFeed>)>,
            aggregator: Arc<TagAggregator>,
            index: usize,
            tag: String,
            combined_filename: &str,
            max_pages: u32,
        ) {
            let collides = format!("{}.xml", tag) == combined_filename;
            join_set.spawn(async move {
                if collides {
                    return (index, Err(Error::InvalidTag(tag)));
                }
                (index, aggregator.aggregate(&tag, max_pages).await)
            });
        }

        for _ in 0..self.tag_concurrency {
            if let Some((index, tag)) = pending.next() {
                spawn_task(
                    &mut join_set,
                    Arc::clone(&self.aggregator),
                    index,
                    tag,
                    &self.combined_filename,
                    max_pages,
                );
            }
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!("Tag task failed: {}", e),
            }

            if let Some((index, tag)) = pending.next() {
                spawn_task(
                    &mut join_set,
                    Arc::clone(&self.aggregator),
                    index,
                    tag,
                    &self.combined_filename,
                    max_pages,
                );
            }
        }

        results
    }
}

/// Write `xml` to `path` through a temporary sibling so readers never see a partial file
async fn write_feed(path: &Path, xml: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let write_error = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    tokio::fs::write(&tmp_path, xml).await.map_err(write_error)?;
    if let Err(source) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_error(source));
    }

    tracing::info!("Generated feed: {}", path.display());
    Ok(())
}
