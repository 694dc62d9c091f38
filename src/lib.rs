//! Press-Sieve: a feed article acquisition pipeline
//!
//! This crate fetches the pages linked from syndicated feed entries, extracts
//! clean article text, enriches it through an external text-analysis service
//! and persists deduplicated article records.

pub mod analysis;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod fetcher;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod retry;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Press-Sieve operations
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Page pool error: {0}")]
    Pool(#[from] pool::PoolError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] fetcher::FetchFailure),

    #[error("Extraction setup error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("Analysis service error: {0}")]
    Analysis(#[from] analysis::AnalysisFailure),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] storage::IngestError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Press-Sieve operations
pub type Result<T> = std::result::Result<T, SieveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use dedup::{fingerprint, ContentFingerprint, DedupGate, FingerprintKind};
pub use extract::{ExtractedArticle, ExtractionChain};
pub use fetcher::{FetchFailure, FetchStrategy, FetchTarget, Fetcher, RawPage};
pub use pipeline::{BatchSummary, FeedItem, Pipeline};
pub use pool::{PageHandle, PageResourcePool};
pub use retry::{RetryError, RetryPolicy};
pub use url::{extract_domain, normalize_url};
