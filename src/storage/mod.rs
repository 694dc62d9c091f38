//! Storage module for persisting articles
//!
//! This module handles all database operations for the pipeline, including:
//! - SQLite database initialization and schema management
//! - Fingerprint lookups for deduplication
//! - The ingestion transaction (article, tags, tag links, source)
//! - Batch run tracking

mod schema;
mod sqlite;
mod traits;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStorage;
pub use traits::{IngestError, Storage, StorageError, StorageResult};

use crate::analysis::AnalysisResult;
use crate::dedup::ContentFingerprint;
use crate::extract::ExtractedArticle;
use crate::pipeline::FeedItem;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between concurrently running item pipelines
///
/// The lock is only ever held for synchronous database work, never across
/// an `.await`.
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing
pub fn share<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks shared storage, reporting a poisoned lock as a storage error
pub fn lock(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, dyn Storage + Send + 'static>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// A stored article
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub id: i64,
    pub guid: String,
    pub source_id: String,
    pub url: String,
    pub url_hash: String,
    pub content_hash: String,
    pub title: String,
    pub author: Option<String>,
    pub plain_text: String,
    pub source_html: Option<String>,
    pub summary: String,
    pub classification: serde_json::Value,
    pub read_time_minutes: u32,
    pub extraction_strategy: String,
    pub published_at: String,
    pub fetched_at: String,
    pub last_updated_at: String,
    /// ISO 639-1 code of the body's language
    pub language: Option<String>,
    pub tags: Vec<String>,
}

/// A feed source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
    pub url: Option<String>,
    pub last_fetched_at: Option<String>,
}

/// Everything one ingestion writes
///
/// The publish date is resolved before any transaction starts; see
/// [`resolve_publish_date`].
#[derive(Debug, Clone, Copy)]
pub struct IngestRequest<'a> {
    pub item: &'a FeedItem,
    pub article: &'a ExtractedArticle,
    pub analysis: &'a AnalysisResult,
    pub url_hash: &'a ContentFingerprint,
    pub content_hash: &'a ContentFingerprint,
    pub fetched_at: DateTime<Utc>,
    pub keep_source_html: bool,
}

/// Represents a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Status of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Title stored for an item: the feed's title, else the extracted one, else the URL
pub fn article_title(item: &FeedItem, article: &ExtractedArticle) -> String {
    [Some(item.title.as_str()), article.title.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(item.url.as_str())
        .to_string()
}

/// Estimated reading time at 200 characters per minute
pub fn read_time_minutes(text: &str) -> u32 {
    (text.chars().count() as f64 / 200.0).round() as u32
}

/// Parses a publish date in any of the formats feeds commonly use
///
/// Accepts RFC 3339, RFC 2822, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%d %H:%M` and
/// `%Y-%m-%d`. Dates without an offset are taken as UTC.
///
/// # Examples
///
/// ```
/// use press_sieve::storage::parse_publish_date;
///
/// assert!(parse_publish_date("Wed, 01 May 2024 09:00:00 +0800").is_some());
/// assert!(parse_publish_date("2024-05-01").is_some());
/// assert!(parse_publish_date("yesterday").is_none());
/// ```
pub fn parse_publish_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// The publish date of an item
///
/// The feed's date wins and must parse when present; otherwise the date the
/// extractor found is used. No usable date is an [`IngestError`].
pub fn resolve_publish_date(
    item: &FeedItem,
    article: &ExtractedArticle,
) -> Result<DateTime<Utc>, IngestError> {
    let raw = match item.published_at.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw,
        None => article
            .publish_date
            .as_deref()
            .ok_or_else(|| IngestError::MissingPublishDate {
                guid: item.guid.clone(),
            })?,
    };

    parse_publish_date(raw).ok_or_else(|| IngestError::InvalidPublishDate {
        guid: item.guid.clone(),
        value: raw.to_string(),
    })
}
