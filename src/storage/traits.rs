//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::pipeline::BatchSummary;
use crate::storage::{ArticleRecord, IngestRequest, RunRecord, RunStatus, SourceRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Article not found: {0}")]
    ArticleNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Why an item could not be ingested
#[derive(Debug, Error)]
pub enum IngestError {
    /// Neither the feed nor the page carried a publish date
    #[error("item {guid} has no publish date")]
    MissingPublishDate { guid: String },

    #[error("item {guid} has an unparseable publish date '{value}'")]
    InvalidPublishDate { guid: String, value: String },

    /// The transaction failed and was rolled back
    #[error("ingestion rolled back: {0}")]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for IngestError {
    fn from(e: rusqlite::Error) -> Self {
        IngestError::Storage(StorageError::Sqlite(e))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the pipeline.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new batch run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the outcome of a run and its finish timestamp
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &BatchSummary,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Articles =====

    /// Finds the article whose canonical-URL fingerprint is `hash`
    fn find_by_url_hash(&self, hash: &str) -> StorageResult<Option<ArticleRecord>>;

    /// Finds the article whose content fingerprint is `hash`
    fn find_by_content_hash(&self, hash: &str) -> StorageResult<Option<ArticleRecord>>;

    /// Inserts or updates an article in one transaction
    ///
    /// Upserts the article (keyed by either fingerprint), inserts new tags,
    /// links tags to the article and updates the source's last-fetched
    /// timestamp. Any failure rolls back every step. An unusable publish
    /// date fails before the transaction starts.
    ///
    /// # Returns
    ///
    /// The article ID
    fn ingest(&mut self, request: &IngestRequest<'_>) -> Result<i64, IngestError>;

    /// Gets an article by ID, tags included
    fn get_article(&self, article_id: i64) -> StorageResult<ArticleRecord>;

    /// Gets a source by ID
    fn get_source(&self, source_id: &str) -> StorageResult<Option<SourceRecord>>;

    // ===== Statistics =====

    fn count_articles(&self) -> StorageResult<u64>;

    fn count_tags(&self) -> StorageResult<u64>;

    fn count_sources(&self) -> StorageResult<u64>;
}
