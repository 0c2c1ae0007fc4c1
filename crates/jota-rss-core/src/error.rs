use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid tag: {0:?}")]
    InvalidTag(String),

    #[error("Feed rendering error: {0}")]
    Render(String),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to obtain one listing page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for URL: {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to fetch {url} after {attempts} attempts: {cause}")]
    Exhausted {
        url: String,
        attempts: u32,
        cause: String,
    },

    #[error("Page too large ({size} bytes) for URL: {url}")]
    TooLarge { url: String, size: usize },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Exhausted { url, .. }
            | FetchError::TooLarge { url, .. } => url,
        }
    }

    /// Whether the failure came from a condition that retrying could clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Exhausted { .. })
    }
}

/// Why a tag produced no feed file.
#[derive(Error, Debug)]
pub enum TagFailure {
    #[error("no articles: {0}")]
    Fetch(FetchError),

    #[error("no articles found")]
    Empty,

    #[error("{0}")]
    Fatal(#[from] Error),

    #[error("feed not written: {0}")]
    Write(Error),
}
