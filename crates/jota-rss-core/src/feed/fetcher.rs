use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Proxy, StatusCode};
use tokio::sync::Semaphore;

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::{Error, Result};

const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

/// Source of listing page HTML
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError>;
}

/// HTTP page fetcher with retry and a shared in-flight request gate
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
    gate: Arc<Semaphore>,
    max_retries: u32,
    retry_delay: Duration,
}

enum Attempt {
    Done(Bytes),
    Retry(String),
    Fail(FetchError),
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        if config.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        let client = Self::build_client(config)?;

        Ok(Self {
            client,
            gate: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Build HTTP client with optional proxy
    fn build_client(config: &FetchConfig) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .default_headers(Self::default_headers())
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(ref proxy) = config.proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for page fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"),
        );
        headers
    }

    /// Number of requests that may be in flight at once
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }

    /// One request, holding a gate permit until the body is read
    async fn attempt(&self, url: &str) -> Attempt {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => return Attempt::Retry(format!("request gate closed: {}", e)),
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(e.to_string()),
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry(format!("HTTP {}", status));
        }
        if !status.is_success() {
            return Attempt::Fail(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        match response.bytes().await {
            Ok(bytes) if bytes.len() > MAX_PAGE_BYTES => Attempt::Fail(FetchError::TooLarge {
                url: url.to_string(),
                size: bytes.len(),
            }),
            Ok(bytes) => Attempt::Done(bytes),
            Err(e) => Attempt::Retry(format!("failed to read response body: {}", e)),
        }
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    /// Fetch with retry and exponential backoff
    async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        let attempts = self.max_retries + 1;
        let mut delay = self.retry_delay;
        let mut last_cause = String::new();

        for attempt in 1..=attempts {
            tracing::debug!("Fetch attempt {} for {}", attempt, url);

            match self.attempt(url).await {
                Attempt::Done(bytes) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Attempt::Fail(e) => {
                    tracing::warn!("Giving up on {}: {}", url, e);
                    return Err(e);
                }
                Attempt::Retry(cause) => {
                    if attempt < attempts {
                        tracing::warn!(
                            "Request failed for {} (attempt {}): {}, retrying after {}ms...",
                            url,
                            attempt,
                            cause,
                            delay.as_millis()
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                    last_cause = cause;
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            cause: last_cause,
        })
    }
}
