//! Batch counters and stored-data statistics
//!
//! This module provides the per-batch summary and the statistics printed by
//! `--stats`.

use crate::storage::{RunRecord, Storage, StorageResult};
use std::fmt;

/// What happened to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Article stored (inserted or updated)
    Stored { article_id: i64, degraded: bool },
    /// An article with the same canonical URL already exists
    DuplicateUrl { article_id: i64 },
    /// An article with the same text already exists
    DuplicateContent { article_id: i64 },
    InvalidUrl,
    FetchFailed,
    /// No usable publish date; nothing was written
    InvalidDate,
    /// The ingestion transaction rolled back
    PersistenceFailed,
    /// The item's pipeline panicked
    Panicked,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stored { .. } => "stored",
            Self::DuplicateUrl { .. } => "duplicate-url",
            Self::DuplicateContent { .. } => "duplicate-content",
            Self::InvalidUrl => "invalid-url",
            Self::FetchFailed => "fetch-failed",
            Self::InvalidDate => "invalid-date",
            Self::PersistenceFailed => "persistence-failed",
            Self::Panicked => "panicked",
        }
    }
}

/// Counters for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items stored
    pub processed: u64,
    /// Items recognised as duplicates
    pub skipped: u64,
    /// Items that failed anywhere in the pipeline
    pub failed: u64,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Stored { .. } => self.processed += 1,
            ItemOutcome::DuplicateUrl { .. } | ItemOutcome::DuplicateContent { .. } => {
                self.skipped += 1
            }
            _ => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.processed + self.skipped + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} skipped, {} failed",
            self.processed, self.skipped, self.failed
        )
    }
}

/// Stored-data statistics
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    pub articles: u64,
    pub tags: u64,
    pub sources: u64,
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        articles: storage.count_articles()?,
        tags: storage.count_tags()?,
        sources: storage.count_sources()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Press-Sieve Statistics ===\n");

    println!("Stored:");
    println!("  Articles: {}", stats.articles);
    println!("  Tags: {}", stats.tags);
    println!("  Sources: {}", stats.sources);
    println!();

    match &stats.latest_run {
        Some(run) => {
            println!("Last Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            println!(
                "  Finished: {}",
                run.finished_at.as_deref().unwrap_or("(not finished)")
            );
            println!(
                "  Items: {} processed, {} skipped, {} failed",
                run.processed, run.skipped, run.failed
            );
        }
        None => println!("No runs recorded yet."),
    }
}
