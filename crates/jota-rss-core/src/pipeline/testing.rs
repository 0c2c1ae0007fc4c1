use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::{Site, TagAggregator};
use crate::config::SiteConfig;
use crate::error::FetchError;
use crate::feed::{Extractor, PageSource};

/// In-memory page source that records every request.
///
/// Unknown URLs answer 404, URLs under a failing prefix answer a transient error.
#[derive(Default)]
pub struct FakeSource {
    pages: HashMap<String, String>,
    failing_prefixes: Vec<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing_prefixes.push(prefix.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_under(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|u| u.starts_with(prefix)).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FakeSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing_prefixes.iter().any(|p| url.starts_with(p.as_str())) {
            Err(FetchError::Exhausted {
                url: url.to_string(),
                attempts: 3,
                cause: "HTTP 503 Service Unavailable".to_string(),
            })
        } else {
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub const BASE: &str = "https://www.jota.info";

pub fn page_url(tag: &str, page: u32) -> String {
    if page == 1 {
        format!("{}/tudo-sobre/{}/", BASE, tag)
    } else {
        format!("{}/tudo-sobre/{}/page/{}/", BASE, tag, page)
    }
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

/// A listing page with one card per `(title, path, published)`
pub fn listing(cards: &[(&str, &str, DateTime<Utc>)]) -> String {
    let mut html = String::from("<html><body><main>\n");
    for (title, path, published) in cards {
        html.push_str(&format!(
            "<article><h2><a href=\"{}\">{}</a></h2><time datetime=\"{}\"></time></article>\n",
            path,
            title,
            published.to_rfc3339()
        ));
    }
    html.push_str("</main></body></html>");
    html
}

/// A listing page carrying its posts and page count in `__NEXT_DATA__`
pub fn next_data_listing(total_pages: u32, posts: &[(&str, &str, DateTime<Utc>)]) -> String {
    let posts: Vec<serde_json::Value> = posts
        .iter()
        .map(|(title, path, published)| {
            serde_json::json!({
                "title": title,
                "permalink": path,
                "date": published.to_rfc3339(),
            })
        })
        .collect();
    let data = serde_json::json!({
        "props": { "pageProps": { "totalPages": total_pages, "posts": posts } }
    });
    format!(
        "<html><body><script id=\"__NEXT_DATA__\" type=\"application/json\">{}</script></body></html>",
        data
    )
}

pub fn aggregator(source: Arc<FakeSource>) -> TagAggregator {
    TagAggregator::new(
        source,
        Arc::new(Extractor::new().unwrap()),
        Site::from_config(&SiteConfig::default()).unwrap(),
    )
}
