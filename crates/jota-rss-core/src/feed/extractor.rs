//! Article extraction from tag listing pages.
//!
//! All knowledge of the site's markup lives here. Listings are read from the
//! embedded Next.js payload when the page carries one, otherwise from the
//! repeated article cards of the rendered HTML.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use url::Url;

use super::dates::{parse_published, parse_published_utc};
use super::models::Article;
use crate::{Error, Result};

const NEXT_DATA_SELECTOR: &str = "script#__NEXT_DATA__";
const BASE_SELECTOR: &str = "base[href]";
const CARD_SELECTOR: &str = "article";
const TIME_SELECTOR: &str = "time[datetime]";
const AUTHOR_SELECTOR: &str = "a[href*=\"/autor/\"]";
const CATEGORY_SELECTOR: &str = ".category, .post-category";
const IMAGE_SELECTOR: &str = "img";

// Highest priority first. A selector list would match in document order.
const TITLE_LINK_SELECTORS: &[&str] = &["h2 a[href]", "h3 a[href]", ".title a[href]"];
const DATE_TEXT_SELECTORS: &[&str] = &["time", ".date", ".post-date"];
const SUMMARY_SELECTORS: &[&str] = &[".excerpt", ".summary", "p"];

/// Compiled selectors for the listing template
#[derive(Debug)]
struct Selectors {
    next_data: Selector,
    base: Selector,
    card: Selector,
    time: Selector,
    author: Selector,
    category: Selector,
    image: Selector,
    title_links: Vec<Selector>,
    date_texts: Vec<Selector>,
    summaries: Vec<Selector>,
}

impl Selectors {
    fn compile() -> Result<Self> {
        Ok(Self {
            next_data: selector(NEXT_DATA_SELECTOR)?,
            base: selector(BASE_SELECTOR)?,
            card: selector(CARD_SELECTOR)?,
            time: selector(TIME_SELECTOR)?,
            author: selector(AUTHOR_SELECTOR)?,
            category: selector(CATEGORY_SELECTOR)?,
            image: selector(IMAGE_SELECTOR)?,
            title_links: selectors(TITLE_LINK_SELECTORS)?,
            date_texts: selectors(DATE_TEXT_SELECTORS)?,
            summaries: selectors(SUMMARY_SELECTORS)?,
        })
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Other(format!("Invalid selector {:?}: {:?}", css, e)))
}

fn selectors(list: &[&str]) -> Result<Vec<Selector>> {
    list.iter().map(|css| selector(css)).collect()
}

/// Texts of the elements matching each selector, one selector after another
fn texts_by_priority<'a>(
    card: ElementRef<'a>,
    selectors: &'a [Selector],
) -> impl Iterator<Item = String> + 'a {
    selectors.iter().flat_map(move |s| {
        card.select(s)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
    })
}

/// What one listing page yielded
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub articles: Vec<Article>,
    /// Page count announced by the site, when the page carries one
    pub total_pages: Option<u32>,
}

/// Pulls article records out of a listing page
#[derive(Debug)]
pub struct Extractor {
    selectors: Selectors,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            selectors: Selectors::compile()?,
        })
    }

    /// Extract the articles of one listing page.
    ///
    /// Relative links resolve against the page's `<base href>` or `page_url`.
    /// Cards without a title or link are skipped, and articles without a
    /// parseable date are stamped with `scraped_at`.
    pub fn extract(&self, html: &str, page_url: &Url, scraped_at: DateTime<Utc>) -> ExtractedPage {
        let document = Html::parse_document(html);
        let base = self.base_url(&document, page_url);

        if let Some(page) = self.extract_next_data(&document, &base, scraped_at) {
            return page;
        }

        ExtractedPage {
            articles: document
                .select(&self.selectors.card)
                .filter_map(|card| self.extract_card(card, &base, scraped_at))
                .collect(),
            total_pages: None,
        }
    }

    fn base_url(&self, document: &Html, page_url: &Url) -> Url {
        document
            .select(&self.selectors.base)
            .next()
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .unwrap_or_else(|| page_url.clone())
    }

    /// Articles from the Next.js payload, or `None` when the page has no usable payload
    fn extract_next_data(
        &self,
        document: &Html,
        base: &Url,
        scraped_at: DateTime<Utc>,
    ) -> Option<ExtractedPage> {
        let script = document.select(&self.selectors.next_data).next()?;
        let json = script.text().collect::<String>();

        let data: NextData = match serde_json::from_str(json.trim()) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to parse __NEXT_DATA__, falling back to HTML cards: {}", e);
                return None;
            }
        };

        let page_props = data.props.page_props;
        let total_pages = page_props.total_pages();
        let posts = page_props.posts?;
        Some(ExtractedPage {
            articles: posts
                .into_iter()
                .filter_map(|post| post.into_article(base, scraped_at))
                .collect(),
            total_pages,
        })
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
        base: &Url,
        scraped_at: DateTime<Utc>,
    ) -> Option<Article> {
        let link = self
            .selectors
            .title_links
            .iter()
            .find_map(|s| card.select(s).next());
        let Some(link) = link else {
            tracing::debug!("Skipping card without title link");
            return None;
        };

        let title = collapse_whitespace(&link.text().collect::<String>());
        let url = link.value().attr("href").and_then(|href| canonical_url(base, href));
        let (title, url) = match (title, url) {
            (title, Some(url)) if !title.is_empty() => (title, url),
            _ => {
                tracing::debug!("Skipping card with empty title or unusable link");
                return None;
            }
        };

        let published_at = self.card_date(card).unwrap_or(scraped_at);

        let summary = texts_by_priority(card, &self.selectors.summaries)
            .find(|text| !text.is_empty() && *text != title)
            .unwrap_or_default();

        let mut authors: Vec<String> = Vec::new();
        for el in card.select(&self.selectors.author) {
            let name = collapse_whitespace(&el.text().collect::<String>());
            let name = name.trim_end_matches(',').trim().to_string();
            if !name.is_empty() && !authors.contains(&name) {
                authors.push(name);
            }
        }

        let category = card
            .select(&self.selectors.category)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|text| !text.is_empty());

        let image_url = card
            .select(&self.selectors.image)
            .find_map(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .and_then(|src| canonical_url(base, src));

        Some(Article {
            title,
            url,
            published_at,
            summary,
            authors,
            category,
            image_url,
        })
    }

    fn card_date(&self, card: ElementRef<'_>) -> Option<DateTime<Utc>> {
        let from_attr = card
            .select(&self.selectors.time)
            .filter_map(|el| el.value().attr("datetime"))
            .find_map(parse_published);

        from_attr.or_else(|| {
            texts_by_priority(card, &self.selectors.date_texts).find_map(|text| parse_published(&text))
        })
    }
}

/// Absolute http(s) URL for `href` without its fragment
pub fn canonical_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Plain text of an HTML snippet with entities decoded
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    collapse_whitespace(&fragment.root_element().text().collect::<String>())
}

#[derive(Debug, Default, Deserialize)]
struct NextData {
    #[serde(default)]
    props: NextProps,
}

#[derive(Debug, Default, Deserialize)]
struct NextProps {
    #[serde(default, rename = "pageProps")]
    page_props: PageProps,
}

#[derive(Debug, Default, Deserialize)]
struct PageProps {
    #[serde(default)]
    posts: Option<Vec<NextPost>>,
    /// A number, though some builds send it as a string
    #[serde(default, rename = "totalPages")]
    total_pages: Option<serde_json::Value>,
}

impl PageProps {
    fn total_pages(&self) -> Option<u32> {
        match self.total_pages.as_ref()? {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct NextPost {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    author: Option<OneOrMany>,
    #[serde(default)]
    category: Option<Named>,
    #[serde(default)]
    image: Option<Named>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    date_gmt: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Named>),
    One(Named),
}

/// A `{"name": ..}` / `{"url": ..}` object, a bare string, or anything else
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Named {
    Object {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
    Text(String),
    Other(serde_json::Value),
}

impl Named {
    fn name(&self) -> Option<&str> {
        let name = match self {
            Named::Object { name, .. } => name.as_deref(),
            Named::Text(text) => Some(text.as_str()),
            Named::Other(_) => None,
        };
        name.filter(|s| !s.trim().is_empty())
    }

    fn url(&self) -> Option<&str> {
        match self {
            Named::Object { url, .. } => url.as_deref(),
            Named::Text(text) => Some(text.as_str()),
            Named::Other(_) => None,
        }
    }
}

impl NextPost {
    /// First of `date`, `publishedAt`, `date_gmt` that parses
    fn published(&self) -> Option<DateTime<Utc>> {
        self.date
            .as_deref()
            .and_then(parse_published)
            .or_else(|| self.published_at.as_deref().and_then(parse_published))
            .or_else(|| self.date_gmt.as_deref().and_then(parse_published_utc))
    }

    fn summary(&self) -> String {
        [self.excerpt.as_deref(), self.summary.as_deref()]
            .into_iter()
            .flatten()
            .map(html_to_text)
            .find(|text| !text.is_empty())
            .unwrap_or_default()
    }

    fn into_article(self, base: &Url, scraped_at: DateTime<Utc>) -> Option<Article> {
        let published_at = self.published().unwrap_or(scraped_at);
        let summary = self.summary();

        let title = self.title.as_deref().map(html_to_text).unwrap_or_default();
        let url = self.permalink.as_deref().and_then(|p| canonical_url(base, p));

        let (title, url) = match (title, url) {
            (title, Some(url)) if !title.is_empty() => (title, url),
            _ => {
                tracing::debug!("Skipping post without title or permalink");
                return None;
            }
        };

        let authors = match self.author {
            Some(OneOrMany::Many(list)) => list
                .iter()
                .filter_map(Named::name)
                .map(|n| n.trim().to_string())
                .collect(),
            Some(OneOrMany::One(one)) => one.name().map(|n| vec![n.trim().to_string()]).unwrap_or_default(),
            None => Vec::new(),
        };

        Some(Article {
            title,
            url,
            published_at,
            summary,
            authors,
            category: self.category.as_ref().and_then(Named::name).map(|c| c.trim().to_string()),
            image_url: self
                .image
                .as_ref()
                .and_then(Named::url)
                .and_then(|src| canonical_url(base, src)),
        })
    }
}
