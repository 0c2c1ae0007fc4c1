use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use super::site::Site;
use crate::feed::{push_unique, sort_newest_first, Extractor, PageSource, TagFeed};
use crate::tags::validate_tag;
use crate::Result;

/// Walks a tag's listing pages and collects its articles
pub struct TagAggregator {
    source: Arc<dyn PageSource>,
    extractor: Arc<Extractor>,
    site: Site,
}

impl TagAggregator {
    pub fn new(source: Arc<dyn PageSource>, extractor: Arc<Extractor>, site: Site) -> Self {
        Self {
            source,
            extractor,
            site,
        }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Aggregate up to `max_pages` listing pages of `tag`, newest article first.
    ///
    /// Pages are fetched one after another. Pagination ends at the first page
    /// that fails to fetch or adds no new article, or at the last page the
    /// site announces; whatever was collected before that is kept. Only an unusable tag or site URL is an error.
    pub async fn aggregate(&self, tag: &str, max_pages: u32) -> Result<TagFeed> {
        validate_tag(tag)?;
        tracing::info!("Scraping tag: {}", tag);

        let mut feed = TagFeed::empty(tag);
        let mut seen = HashSet::new();

        for page in 1..=max_pages {
            let url = self.site.tag_page_url(tag, page)?;

            let html = match self.source.fetch(url.as_str()).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("Tag {}: stopping at page {}: {}", tag, page, e);
                    feed.stopped_by = Some(e);
                    break;
                }
            };
            feed.pages_fetched += 1;

            let extracted = self.extractor.extract(&html, &url, Utc::now());
            if extracted.articles.is_empty() {
                tracing::info!("Tag {}: no articles on page {}, stopping", tag, page);
                break;
            }

            let found = extracted.articles.len();
            let added = push_unique(&mut feed.articles, &mut seen, extracted.articles);
            tracing::debug!("Tag {}: page {} had {} articles, {} new", tag, page, found, added);

            if added == 0 {
                tracing::info!("Tag {}: page {} repeated earlier articles, stopping", tag, page);
                break;
            }

            if let Some(total) = extracted.total_pages {
                if page >= total {
                    tracing::info!("Tag {}: page {} is the last of {}, stopping", tag, page, total);
                    break;
                }
            }
        }

        sort_newest_first(&mut feed.articles);
        tracing::info!(
            "Tag {}: scraped {} unique articles from {} pages",
            tag,
            feed.articles.len(),
            feed.pages_fetched
        );

        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{aggregator, at, listing, next_data_listing, page_url, FakeSource};
    use super::*;
    use crate::error::FetchError;
    use crate::Error;

    #[tokio::test]
    async fn test_stops_at_empty_page() {
        let source = Arc::new(
            FakeSource::new()
                .page(
                    &page_url("stf", 1),
                    listing(&[("A", "/stf/a", at(2)), ("B", "/stf/b", at(3))]),
                )
                .page(&page_url("stf", 2), listing(&[]))
                .page(&page_url("stf", 3), listing(&[("C", "/stf/c", at(4))])),
        );

        let feed = aggregator(source.clone()).aggregate("stf", 5).await.unwrap();

        assert_eq!(source.calls(), vec![page_url("stf", 1), page_url("stf", 2)]);
        let titles: Vec<&str> = feed.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
        assert_eq!(feed.pages_fetched, 2);
        assert!(feed.stopped_by.is_none());
    }

    #[tokio::test]
    async fn test_dedups_across_pages_keeping_first() {
        let source = Arc::new(
            FakeSource::new()
                .page(
                    &page_url("stf", 1),
                    listing(&[("A", "/stf/a", at(1)), ("B", "/stf/b", at(5))]),
                )
                .page(
                    &page_url("stf", 2),
                    listing(&[("B again", "/stf/b", at(9)), ("C", "/stf/c", at(3))]),
                ),
        );

        let feed = aggregator(source).aggregate("stf", 2).await.unwrap();

        let titles: Vec<&str> = feed.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C", "A"]);

        let mut urls: Vec<&str> = feed.articles.iter().map(|a| a.url.as_str()).collect();
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), feed.articles.len());
    }

    #[tokio::test]
    async fn test_result_is_sorted_newest_first() {
        let source = Arc::new(
            FakeSource::new()
                .page(
                    &page_url("carf", 1),
                    listing(&[("Mid", "/m", at(10)), ("Old", "/o", at(1))]),
                )
                .page(
                    &page_url("carf", 2),
                    listing(&[("New", "/n", at(20)), ("Older", "/oo", at(2))]),
                ),
        );

        let feed = aggregator(source).aggregate("carf", 2).await.unwrap();
        assert!(feed
            .articles
            .windows(2)
            .all(|w| w[0].published_at >= w[1].published_at));
        assert_eq!(feed.articles[0].title, "New");
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_earlier_pages() {
        let source = Arc::new(
            FakeSource::new().page(&page_url("stf", 1), listing(&[("A", "/stf/a", at(2))])),
        );

        let feed = aggregator(source.clone()).aggregate("stf", 3).await.unwrap();

        assert_eq!(feed.articles.len(), 1);
        assert_eq!(source.calls().len(), 2);
        assert!(matches!(
            feed.stopped_by,
            Some(FetchError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_on_first_page_gives_empty_feed() {
        let source = Arc::new(FakeSource::new().failing(&page_url("stf", 1)));

        let feed = aggregator(source).aggregate("stf", 3).await.unwrap();

        assert!(feed.is_empty());
        assert_eq!(feed.pages_fetched, 0);
        assert!(feed.stopped_by.as_ref().is_some_and(FetchError::is_transient));
    }

    #[tokio::test]
    async fn test_stops_when_page_repeats_earlier_articles() {
        let page = listing(&[("A", "/stf/a", at(2))]);
        let source = Arc::new(
            FakeSource::new()
                .page(&page_url("stf", 1), page.clone())
                .page(&page_url("stf", 2), page)
                .page(&page_url("stf", 3), listing(&[("C", "/stf/c", at(4))])),
        );

        let feed = aggregator(source.clone()).aggregate("stf", 3).await.unwrap();

        assert_eq!(source.calls().len(), 2);
        assert_eq!(feed.articles.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_pages_makes_no_requests() {
        let source = Arc::new(FakeSource::new());

        let feed = aggregator(source.clone()).aggregate("stf", 0).await.unwrap();

        assert!(feed.is_empty());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_tag_is_fatal() {
        let source = Arc::new(FakeSource::new());

        let result = aggregator(source.clone()).aggregate("../etc", 3).await;

        assert!(matches!(result, Err(Error::InvalidTag(_))));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_announced_page_count() {
        let source = Arc::new(
            FakeSource::new()
                .page(&page_url("stf", 1), next_data_listing(1, &[("A", "/stf/a", at(2))]))
                .page(&page_url("stf", 2), listing(&[("B", "/stf/b", at(3))])),
        );

        let feed = aggregator(source.clone()).aggregate("stf", 3).await.unwrap();

        assert_eq!(source.calls(), vec![page_url("stf", 1)]);
        assert_eq!(feed.articles.len(), 1);
        assert_eq!(feed.pages_fetched, 1);
        assert!(feed.stopped_by.is_none());
    }

    #[tokio::test]
    async fn test_announced_page_count_below_max_pages() {
        let source = Arc::new(
            FakeSource::new()
                .page(&page_url("carf", 1), next_data_listing(2, &[("A", "/a", at(1))]))
                .page(&page_url("carf", 2), next_data_listing(2, &[("B", "/b", at(2))]))
                .page(&page_url("carf", 3), next_data_listing(2, &[("C", "/c", at(3))])),
        );

        let feed = aggregator(source.clone()).aggregate("carf", 5).await.unwrap();

        assert_eq!(source.calls().len(), 2);
        let titles: Vec<&str> = feed.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_max_pages_below_announced_page_count() {
        let source = Arc::new(
            FakeSource::new()
                .page(&page_url("stf", 1), next_data_listing(9, &[("A", "/a", at(1))]))
                .page(&page_url("stf", 2), next_data_listing(9, &[("B", "/b", at(2))])),
        );

        aggregator(source.clone()).aggregate("stf", 1).await.unwrap();

        assert_eq!(source.calls(), vec![page_url("stf", 1)]);
    }
}
