mod dates;
mod extractor;
mod fetcher;
mod models;
mod render;

pub use dates::{parse_published, parse_published_utc};
pub use extractor::{canonical_url, ExtractedPage, Extractor};
pub use fetcher::{PageFetcher, PageSource};
pub use models::{push_unique, sort_newest_first, Article, CombinedFeed, TagFeed};
pub use render::{render, ChannelInfo};
