use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::FetchError;

/// One article scraped from a tag listing
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub title: String,
    /// Canonical absolute URL, the identity of the article
    pub url: String,
    pub published_at: DateTime<Utc>,
    /// Plain-text excerpt, may be empty
    pub summary: String,
    pub authors: Vec<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            published_at,
            summary: String::new(),
            authors: Vec::new(),
            category: None,
            image_url: None,
        }
    }

    /// Text for the feed item description.
    ///
    /// Uses the summary when there is one, otherwise `[category] - Por a, b`,
    /// otherwise the title.
    pub fn description(&self) -> String {
        if !self.summary.is_empty() {
            return self.summary.clone();
        }

        let mut parts = Vec::new();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            parts.push(format!("[{}]", category));
        }
        if !self.authors.is_empty() {
            parts.push(format!("Por {}", self.authors.join(", ")));
        }

        if parts.is_empty() {
            self.title.clone()
        } else {
            parts.join(" - ")
        }
    }
}

/// Articles aggregated for one tag
#[derive(Debug, Clone)]
pub struct TagFeed {
    pub tag: String,
    /// Newest first, unique by url
    pub articles: Vec<Article>,
    pub pages_fetched: u32,
    /// Fetch failure that ended pagination, if any
    pub stopped_by: Option<FetchError>,
}

impl TagFeed {
    pub fn empty(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            articles: Vec::new(),
            pages_fetched: 0,
            stopped_by: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Union of several tag feeds, unique by url, newest first
#[derive(Debug, Clone, Default)]
pub struct CombinedFeed {
    pub articles: Vec<Article>,
}

impl CombinedFeed {
    /// Merge feeds in the given order; the first occurrence of a url wins.
    pub fn from_tag_feeds<'a>(feeds: impl IntoIterator<Item = &'a TagFeed>) -> Self {
        Self::merge(feeds, false)
    }

    /// Like [`CombinedFeed::from_tag_feeds`], with every title prefixed by
    /// `[TAG]` of the feed the article was first seen in.
    pub fn from_tag_feeds_labelled<'a>(feeds: impl IntoIterator<Item = &'a TagFeed>) -> Self {
        Self::merge(feeds, true)
    }

    fn merge<'a>(feeds: impl IntoIterator<Item = &'a TagFeed>, label: bool) -> Self {
        let mut seen = HashSet::new();
        let mut articles = Vec::new();

        for feed in feeds {
            let prefix = format!("[{}] ", feed.tag.to_uppercase());
            let incoming = feed.articles.iter().cloned().map(|mut article| {
                if label {
                    article.title.insert_str(0, &prefix);
                }
                article
            });
            push_unique(&mut articles, &mut seen, incoming);
        }

        sort_newest_first(&mut articles);
        Self { articles }
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

/// Append articles whose url is not in `seen`, returning how many were added.
pub fn push_unique(
    articles: &mut Vec<Article>,
    seen: &mut HashSet<String>,
    incoming: impl IntoIterator<Item = Article>,
) -> usize {
    let before = articles.len();
    for article in incoming {
        if seen.insert(article.url.clone()) {
            articles.push(article);
        }
    }
    articles.len() - before
}

/// Stable sort by `published_at`, newest first
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}
