//! Fingerprints and the duplicate gate
//!
//! Two fingerprints identify an article: one over its canonical URL (checked
//! before fetching) and one over its extracted text (checked before
//! analysis). Both are SHA-256 digests rendered as 64 lowercase hex chars.

use crate::storage::{self, ArticleRecord, SharedStorage, StorageResult};
use crate::url::normalize_url;
use crate::UrlError;
use sha2::{Digest, Sha256};
use std::fmt;

/// A fixed-length one-way digest of UTF-8 text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Fingerprint of a URL after canonicalisation
    pub fn of_url(url: &str) -> Result<Self, UrlError> {
        Ok(fingerprint(normalize_url(url)?.as_str()))
    }

    /// Fingerprint of article text with whitespace runs collapsed
    pub fn of_text(text: &str) -> Self {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        fingerprint(&collapsed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of `text` as lowercase hex
///
/// # Examples
///
/// ```
/// use press_sieve::fingerprint;
///
/// let a = fingerprint("hello");
/// assert_eq!(a.as_str().len(), 64);
/// assert_eq!(a, fingerprint("hello"));
/// ```
pub fn fingerprint(text: &str) -> ContentFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    ContentFingerprint(hex::encode(hasher.finalize()))
}

/// Which fingerprint a lookup uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintKind {
    Url,
    Content,
}

impl FingerprintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FingerprintKind::Url => "url",
            FingerprintKind::Content => "content",
        }
    }
}

/// Looks up stored articles by fingerprint
#[derive(Clone)]
pub struct DedupGate {
    storage: SharedStorage,
}

impl DedupGate {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Returns the stored article carrying `value`, if any
    pub fn check_duplicate(
        &self,
        kind: FingerprintKind,
        value: &ContentFingerprint,
    ) -> StorageResult<Option<ArticleRecord>> {
        let storage = storage::lock(&self.storage)?;
        let found = match kind {
            FingerprintKind::Url => storage.find_by_url_hash(value.as_str())?,
            FingerprintKind::Content => storage.find_by_content_hash(value.as_str())?,
        };

        if let Some(record) = &found {
            tracing::debug!(
                kind = kind.as_str(),
                fingerprint = %value,
                article_id = record.id,
                "duplicate found"
            );
        }
        Ok(found)
    }
}
