//! Feed items and where batches get them from

use crate::queue::PersistentQueue;
use crate::SieveError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// One entry of a syndicated feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Identifier of the feed the entry came from
    pub source_id: String,
    /// URL of the feed itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default = "new_guid")]
    pub guid: String,
    /// Link to the article page
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Publish date exactly as the feed wrote it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

fn new_guid() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl FeedItem {
    pub fn new(source_id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_url: None,
            guid: new_guid(),
            url: url.into(),
            title: title.into(),
            published_at: None,
        }
    }

    pub fn published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }
}

/// Supplies the items of one batch
#[async_trait]
pub trait ItemSource: Send + Sync {
    fn name(&self) -> &str;

    async fn load_items(&self) -> Result<Vec<FeedItem>, SieveError>;
}

/// Drains the persistent queue
pub struct QueueSource {
    queue: Arc<PersistentQueue<FeedItem>>,
}

impl QueueSource {
    pub fn new(queue: Arc<PersistentQueue<FeedItem>>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl ItemSource for QueueSource {
    fn name(&self) -> &str {
        "queue"
    }

    async fn load_items(&self) -> Result<Vec<FeedItem>, SieveError> {
        Ok(self.queue.drain()?)
    }
}

/// Reads a JSON array of items from a file
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ItemSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn load_items(&self) -> Result<Vec<FeedItem>, SieveError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}
