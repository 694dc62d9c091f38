//! Page fetching
//!
//! A URL is classified into a [`FetchTarget`] once, by domain: pages from
//! configured "rendered" domains go through the headless page pool, everything
//! else is a plain HTTP GET. Either way the result is a [`RawPage`].

mod http;
mod rendered;

pub use http::{build_http_client, fetch_static};
pub use rendered::fetch_rendered;

use crate::config::FetcherConfig;
use crate::pool::{PageResourcePool, PoolError};
use crate::url::{extract_domain, DomainPatterns};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// How a page must be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Plain HTTP GET
    Static,
    /// Full browser rendering through the page pool
    Rendered,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::Static => "static",
            FetchStrategy::Rendered => "rendered",
        }
    }
}

/// A URL paired with its fetch strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub url: Url,
    pub domain: String,
    pub strategy: FetchStrategy,
}

/// A fetched document
#[derive(Debug, Clone)]
pub struct RawPage {
    /// The URL that was requested
    pub url: String,
    /// The URL the document was served from, after redirects
    pub final_url: String,
    pub html: String,
    pub strategy: FetchStrategy,
    pub fetched_at: DateTime<Utc>,
    /// Monotonic per-fetcher sequence number
    pub sequence: u64,
}

/// Why a fetch produced no document
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("invalid fetch target '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("rendering {url} failed: {source}")]
    Render {
        url: String,
        #[source]
        source: PoolError,
    },

    #[error("{url} needs rendering but no page pool is configured")]
    NoRenderer { url: String },
}

/// Fetches pages with the strategy their domain calls for
pub struct Fetcher {
    client: Client,
    rendered_domains: DomainPatterns,
    pool: Option<Arc<PageResourcePool>>,
    sequence: AtomicU64,
}

impl Fetcher {
    /// Creates a fetcher; `pool` may be `None` when no domain needs rendering
    pub fn new(
        config: &FetcherConfig,
        pool: Option<Arc<PageResourcePool>>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            rendered_domains: DomainPatterns::new(config.rendered_domains.iter().cloned()),
            pool,
            sequence: AtomicU64::new(0),
        })
    }

    /// Classifies a URL into a fetch target
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use press_sieve::config::FetcherConfig;
    /// use press_sieve::fetcher::{FetchStrategy, Fetcher};
    ///
    /// let fetcher = Fetcher::new(&FetcherConfig::default(), None).unwrap();
    /// let target = fetcher.resolve("https://36kr.com/p/1").unwrap();
    /// assert_eq!(target.strategy, FetchStrategy::Rendered);
    /// ```
    pub fn resolve(&self, url: &str) -> Result<FetchTarget, FetchFailure> {
        let invalid = |reason: String| FetchFailure::InvalidTarget {
            url: url.to_string(),
            reason,
        };

        let parsed = Url::parse(url.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }
        let domain = extract_domain(&parsed).ok_or_else(|| invalid("missing host".to_string()))?;

        let strategy = if self.rendered_domains.matches(&domain) {
            FetchStrategy::Rendered
        } else {
            FetchStrategy::Static
        };

        Ok(FetchTarget {
            url: parsed,
            domain,
            strategy,
        })
    }

    /// Fetches a resolved target
    ///
    /// Exactly one attempt is made; no retries happen here.
    pub async fn fetch(&self, target: &FetchTarget) -> Result<RawPage, FetchFailure> {
        let url = target.url.as_str();
        tracing::debug!(url, strategy = target.strategy.as_str(), "fetching");

        let (final_url, html) = match target.strategy {
            FetchStrategy::Static => fetch_static(&self.client, url).await?,
            FetchStrategy::Rendered => {
                let pool = self.pool.as_ref().ok_or_else(|| FetchFailure::NoRenderer {
                    url: url.to_string(),
                })?;
                (url.to_string(), fetch_rendered(pool, url).await?)
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(url, bytes = html.len(), sequence, "fetched");

        Ok(RawPage {
            url: url.to_string(),
            final_url,
            html,
            strategy: target.strategy,
            fetched_at: Utc::now(),
            sequence,
        })
    }

    /// Resolves and fetches in one step
    pub async fn fetch_url(&self, url: &str) -> Result<RawPage, FetchFailure> {
        let target = self.resolve(url)?;
        self.fetch(&target).await
    }
}
