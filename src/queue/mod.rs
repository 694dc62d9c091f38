//! File-backed FIFO queue
//!
//! Holds feed items between the feed reader and the pipeline. The whole
//! queue is kept in memory and written out as a JSON array on `flush` and on
//! drop; writes go to a temp file that is renamed over the old one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("queue file {path} is not a JSON array of items: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialise queue: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("queue lock poisoned")]
    LockPoisoned,
}

/// A FIFO queue persisted to a JSON file
pub struct PersistentQueue<T: Serialize + DeserializeOwned> {
    path: PathBuf,
    items: Mutex<VecDeque<T>>,
}

impl<T: Serialize + DeserializeOwned> PersistentQueue<T> {
    /// Opens the queue at `path`, reloading items left by a previous process
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();

        let items = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|source| QueueError::Io {
                path: path.clone(),
                source,
            })?;
            if raw.trim().is_empty() {
                VecDeque::new()
            } else {
                serde_json::from_str(&raw).map_err(|source| QueueError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            VecDeque::new()
        };

        tracing::debug!(path = %path.display(), items = items.len(), "queue opened");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn items(&self) -> Result<MutexGuard<'_, VecDeque<T>>, QueueError> {
        self.items.lock().map_err(|_| QueueError::LockPoisoned)
    }

    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        self.items()?.push_back(item);
        Ok(())
    }

    /// Appends many items at once
    pub fn extend(&self, items: impl IntoIterator<Item = T>) -> Result<usize, QueueError> {
        let mut queue = self.items()?;
        let before = queue.len();
        queue.extend(items);
        Ok(queue.len() - before)
    }

    /// Removes the oldest item; `None` when empty
    pub fn dequeue(&self) -> Result<Option<T>, QueueError> {
        Ok(self.items()?.pop_front())
    }

    /// Removes and returns every item, oldest first
    pub fn drain(&self) -> Result<Vec<T>, QueueError> {
        Ok(self.items()?.drain(..).collect())
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|items| items.len()).unwrap_or(0)
    }

    /// Alias of [`len`](Self::len)
    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the current contents to disk
    pub fn flush(&self) -> Result<(), QueueError> {
        let json = {
            let items = self.items()?;
            serde_json::to_string(&*items)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> QueueError {
        QueueError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Drop for PersistentQueue<T> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::error!(path = %self.path.display(), error = %e, "failed to flush queue");
        }
    }
}
