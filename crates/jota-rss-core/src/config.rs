use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Display name used in channel titles
    #[serde(default = "default_site_name")]
    pub name: String,
    /// Site root, e.g. "https://www.jota.info"
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path segment of the tag listings
    #[serde(default = "default_tag_path")]
    pub tag_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: default_site_name(),
            base_url: default_base_url(),
            tag_path: default_tag_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial backoff in milliseconds, doubled on every retry
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Maximum HTTP requests in flight across the whole run
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            max_concurrent_requests: default_max_concurrent_requests(),
            user_agent: default_user_agent(),
            proxy_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Listing pages fetched per tag
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Tags aggregated at the same time
    #[serde(default = "default_tag_concurrency")]
    pub tag_concurrency: usize,
    #[serde(default = "default_combined_filename")]
    pub combined_filename: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Prefix combined feed item titles with `[TAG]` of the tag they came from
    #[serde(default)]
    pub label_combined_items: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_pages: default_max_pages(),
            tag_concurrency: default_tag_concurrency(),
            combined_filename: default_combined_filename(),
            tags: Vec::new(),
            label_combined_items: false,
        }
    }
}

fn default_site_name() -> String {
    "JOTA".to_string()
}

fn default_base_url() -> String {
    "https://www.jota.info".to_string()
}

fn default_tag_path() -> String {
    "tudo-sobre".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay() -> u64 {
    500
}

fn default_max_concurrent_requests() -> usize {
    4
}

fn default_user_agent() -> String {
    "JotaRSSBot/1.0 (+https://github.com/jota-rss-feed)".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_max_pages() -> u32 {
    3
}

fn default_tag_concurrency() -> usize {
    4
}

fn default_combined_filename() -> String {
    "feed.xml".to_string()
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location, or fall back to defaults
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/jota-rss/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("jota-rss")
            .join("config.toml")
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.base_url()?;

        if self.fetch.max_concurrent_requests == 0 {
            return Err(crate::Error::Config(
                "fetch.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.output.tag_concurrency == 0 {
            return Err(crate::Error::Config(
                "output.tag_concurrency must be at least 1".to_string(),
            ));
        }
        if self.output.combined_filename.is_empty()
            || self.output.combined_filename.contains(['/', '\\'])
        {
            return Err(crate::Error::Config(format!(
                "output.combined_filename is not a plain file name: {:?}",
                self.output.combined_filename
            )));
        }

        Ok(())
    }

    /// Parsed site root
    pub fn base_url(&self) -> crate::Result<Url> {
        Url::parse(&self.site.base_url)
            .map_err(|e| crate::Error::Config(format!("Invalid site.base_url: {}", e)))
    }
}
