//! Batch pipeline
//!
//! This module turns feed items into stored articles:
//! - Loading items from a source (persistent queue or JSON file)
//! - Running each item through fetch, extraction, dedup, analysis and ingestion
//! - Recording every batch as a run with its processed/skipped/failed counts

mod coordinator;
mod source;
pub mod stats;

pub use coordinator::Pipeline;
pub use source::{FeedItem, FileSource, ItemSource, QueueSource};
pub use stats::{load_statistics, print_statistics, BatchSummary, ItemOutcome, StoreStatistics};
