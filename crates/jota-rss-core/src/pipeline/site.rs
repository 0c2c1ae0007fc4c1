use url::Url;

use crate::config::SiteConfig;
use crate::feed::ChannelInfo;
use crate::{Error, Result};

/// URL layout and naming of the scraped site
#[derive(Debug, Clone)]
pub struct Site {
    name: String,
    base_url: Url,
    tag_path: Vec<String>,
}

impl Site {
    pub fn new(name: impl Into<String>, base_url: Url, tag_path: &str) -> Self {
        Self {
            name: name.into(),
            base_url,
            tag_path: tag_path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Invalid site.base_url: {}", e)))?;
        Ok(Self::new(config.name.clone(), base_url, &config.tag_path))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Listing page `page` (1-based) of `tag`:
    /// `<base>/<tag_path>/<tag>/` for the first page, `<base>/<tag_path>/<tag>/page/<n>/` after.
    pub fn tag_page_url(&self, tag: &str, page: u32) -> Result<Url> {
        let page = (page > 1).then(|| page.to_string());
        let mut segments = vec![tag];
        if let Some(ref page) = page {
            segments.extend(["page", page.as_str()]);
        }
        self.tag_url(&segments, true)
    }

    /// Public link of a tag's listing, used as the channel link
    pub fn tag_link(&self, tag: &str) -> Result<String> {
        Ok(self.tag_url(&[tag], false)?.to_string())
    }

    fn tag_url(&self, extra: &[&str], trailing_slash: bool) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::Config(format!("Unusable site.base_url: {}", self.base_url)))?;
            segments.pop_if_empty();
            segments.extend(self.tag_path.iter().map(String::as_str));
            segments.extend(extra.iter().copied());
            if trailing_slash {
                segments.push("");
            }
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    pub fn tag_channel(&self, tag: &str) -> Result<ChannelInfo> {
        let words = tag.replace('-', " ");
        Ok(ChannelInfo::new(
            format!("{} - {}", self.name, words.to_uppercase()),
            self.tag_link(tag)?,
            format!("Últimas notícias sobre {} no {}", words, self.name),
        ))
    }

    pub fn combined_channel(&self) -> ChannelInfo {
        ChannelInfo::new(
            format!("{} - Combined Feed", self.name),
            self.base_url.as_str().trim_end_matches('/'),
            format!("Últimas notícias de múltiplos temas no {}", self.name),
        )
    }
}
