//! Pipeline coordinator - per-item pipeline and the batch loop
//!
//! Each item runs strictly in order: URL gate, fetch, extract, content gate,
//! analysis, ingestion. Items of a batch run concurrently on the caller's
//! task (no spawning), bounded by the configured concurrency. A failure or a
//! panic in one item is logged and counted; it never touches its siblings.

use super::source::FeedItem;
use super::stats::{BatchSummary, ItemOutcome};
use crate::analysis::{Analyzer, ChatAnalysisClient};
use crate::config::Config;
use crate::dedup::{ContentFingerprint, DedupGate, FingerprintKind};
use crate::extract::ExtractionChain;
use crate::fetcher::Fetcher;
use crate::pool::PageResourcePool;
use crate::retry::RetryPolicy;
use crate::storage::{
    self, article_title, resolve_publish_date, IngestError, IngestRequest, RunStatus,
    SharedStorage,
};
use crate::SieveError;
use futures::{stream, FutureExt, StreamExt};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Turns feed items into stored articles
pub struct Pipeline {
    fetcher: Fetcher,
    chain: ExtractionChain,
    analyzer: Analyzer,
    gate: DedupGate,
    storage: SharedStorage,
    concurrency: usize,
    keep_source_html: bool,
    config_hash: String,
}

impl Pipeline {
    pub fn new(
        fetcher: Fetcher,
        chain: ExtractionChain,
        analyzer: Analyzer,
        storage: SharedStorage,
    ) -> Self {
        Self {
            fetcher,
            chain,
            analyzer,
            gate: DedupGate::new(Arc::clone(&storage)),
            storage,
            concurrency: 1,
            keep_source_html: false,
            config_hash: String::new(),
        }
    }

    /// Maximum number of items in flight; zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn keep_source_html(mut self, keep: bool) -> Self {
        self.keep_source_html = keep;
        self
    }

    /// Hash recorded with every batch run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    /// Wires a pipeline from configuration
    ///
    /// The analysis client serves both as the analysis service and as the
    /// extraction chain's remote assist.
    pub fn from_config(
        config: &Config,
        config_hash: &str,
        storage: SharedStorage,
        pool: Option<Arc<PageResourcePool>>,
        client: Arc<ChatAnalysisClient>,
    ) -> Result<Self, SieveError> {
        let fetcher = Fetcher::new(&config.fetcher, pool)?;
        let chain = ExtractionChain::new(&config.extraction)?.with_remote(client.clone());
        let analyzer = Analyzer::new(client, RetryPolicy::from(&config.retry));

        Ok(Self::new(fetcher, chain, analyzer, storage)
            .with_concurrency(config.pipeline.concurrency)
            .keep_source_html(config.storage.keep_source_html)
            .with_config_hash(config_hash))
    }

    /// Runs one item through the whole pipeline
    pub async fn process_item(&self, item: &FeedItem) -> ItemOutcome {
        let url = item.url.as_str();

        let url_hash = match ContentFingerprint::of_url(url) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(url, error = %e, "skipping item with invalid URL");
                return ItemOutcome::InvalidUrl;
            }
        };

        match self.gate.check_duplicate(FingerprintKind::Url, &url_hash) {
            Ok(Some(existing)) => {
                tracing::debug!(url, article_id = existing.id, "already stored");
                return ItemOutcome::DuplicateUrl {
                    article_id: existing.id,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(url, error = %e, "URL lookup failed");
                return ItemOutcome::PersistenceFailed;
            }
        }

        let page = match self.fetcher.fetch_url(url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(url, error = %e, "fetch failed, skipping item");
                return ItemOutcome::FetchFailed;
            }
        };

        let article = self.chain.extract(&page).await;
        let content_hash = ContentFingerprint::of_text(&article.plain_text);

        match self
            .gate
            .check_duplicate(FingerprintKind::Content, &content_hash)
        {
            Ok(Some(existing)) => {
                tracing::info!(
                    url,
                    article_id = existing.id,
                    stored_url = %existing.url,
                    "same text already stored"
                );
                return ItemOutcome::DuplicateContent {
                    article_id: existing.id,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(url, error = %e, "content lookup failed");
                return ItemOutcome::PersistenceFailed;
            }
        }

        if let Err(e) = resolve_publish_date(item, &article) {
            tracing::warn!(url, error = %e, "skipping item");
            return ItemOutcome::InvalidDate;
        }

        let title = article_title(item, &article);
        let analysis = self.analyzer.analyze(&title, &article.plain_text).await;

        let request = IngestRequest {
            item,
            article: &article,
            analysis: &analysis,
            url_hash: &url_hash,
            content_hash: &content_hash,
            fetched_at: page.fetched_at,
            keep_source_html: self.keep_source_html,
        };

        let ingested = {
            match storage::lock(&self.storage) {
                Ok(mut storage) => storage.ingest(&request),
                Err(e) => Err(IngestError::from(e)),
            }
        };

        match ingested {
            Ok(article_id) => {
                tracing::info!(
                    url,
                    article_id,
                    strategy = %article.strategy,
                    degraded = analysis.degraded,
                    "article stored"
                );
                ItemOutcome::Stored {
                    article_id,
                    degraded: analysis.degraded,
                }
            }
            Err(e @ IngestError::Storage(_)) => {
                tracing::error!(url, error = %e, "ingestion rolled back");
                ItemOutcome::PersistenceFailed
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "skipping item");
                ItemOutcome::InvalidDate
            }
        }
    }

    /// Processes an item, turning a panic into a failed outcome
    async fn process_guarded(&self, item: &FeedItem) -> ItemOutcome {
        match AssertUnwindSafe(self.process_item(item)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(url = %item.url, "item pipeline panicked");
                ItemOutcome::Panicked
            }
        }
    }

    /// Runs one batch to completion and records it as a run
    pub async fn run_batch(&self, items: Vec<FeedItem>) -> Result<BatchSummary, SieveError> {
        self.run_batch_with_shutdown(items, std::future::pending())
            .await
    }

    /// Runs one batch until it completes or `shutdown` resolves
    ///
    /// On shutdown, items still in flight are dropped and the run is recorded
    /// as interrupted with the counts reached so far.
    pub async fn run_batch_with_shutdown(
        &self,
        items: Vec<FeedItem>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<BatchSummary, SieveError> {
        let run_id = storage::lock(&self.storage)?.create_run(&self.config_hash)?;
        tracing::info!(
            run_id,
            items = items.len(),
            concurrency = self.concurrency,
            "starting batch"
        );

        let start_time = std::time::Instant::now();
        let mut summary = BatchSummary::default();
        let mut outcomes = stream::iter(items.iter())
            .map(|item| self.process_guarded(item))
            .buffer_unordered(self.concurrency);
        tokio::pin!(shutdown);

        let interrupted = loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    tracing::warn!(run_id, "shutdown requested, abandoning in-flight items");
                    break true;
                }
                next = outcomes.next() => match next {
                    Some(outcome) => {
                        summary.record(&outcome);
                        if summary.total() % 10 == 0 {
                            tracing::info!(run_id, "Progress: {} of {} items", summary.total(), items.len());
                        }
                    }
                    None => break false,
                },
            }
        };
        drop(outcomes);

        let status = if interrupted {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        storage::lock(&self.storage)?.finish_run(run_id, status, &summary)?;

        tracing::info!(
            run_id,
            status = status.to_db_string(),
            "Batch finished: {} in {:?}",
            summary,
            start_time.elapsed()
        );
        Ok(summary)
    }
}
