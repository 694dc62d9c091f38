//! Article analysis through an external text-analysis service
//!
//! Two calls per article, each wrapped in the retry policy: a summary with
//! tags, then a classification against the configured taxonomy. When the
//! service stays unavailable the result degrades instead of failing the item.

mod client;
mod payload;

pub use client::ChatAnalysisClient;
pub use payload::{normalize_tags, parse_structured_payload, truncate_chars};

use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the analysis service
#[derive(Debug, Clone, Error)]
pub enum AnalysisFailure {
    #[error("network error: {0}")]
    Network(String),

    #[error("service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("service returned no content")]
    EmptyResponse,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Summary and tags for one article
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub summary: String,
    pub tags: Vec<String>,
}

/// Everything the analysis step contributes to a stored article
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub summary: String,
    pub tags: Vec<String>,
    /// Opaque classification; `Null` when unavailable
    pub classification: Value,
    /// True when at least one call fell back to defaults
    pub degraded: bool,
}

impl AnalysisResult {
    /// The fallback used when summarisation fails
    pub fn degraded(title: &str) -> Self {
        Self {
            summary: title.to_string(),
            tags: Vec::new(),
            classification: Value::Null,
            degraded: true,
        }
    }
}

/// The external analysis service
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn summarize(&self, title: &str, text: &str) -> Result<Summary, AnalysisFailure>;

    async fn classify(
        &self,
        title: &str,
        summary: &str,
        tags: &[String],
    ) -> Result<Value, AnalysisFailure>;
}

/// Runs the analysis calls with retries and degradation
#[derive(Clone)]
pub struct Analyzer {
    service: Arc<dyn AnalysisService>,
    retry: RetryPolicy,
}

impl Analyzer {
    pub fn new(service: Arc<dyn AnalysisService>, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }

    /// Summarises and classifies an article
    ///
    /// A failed summary degrades to `summary = title`, no tags and no
    /// classification. A failed classification alone keeps the summary.
    pub async fn analyze(&self, title: &str, text: &str) -> AnalysisResult {
        let service = self.service.as_ref();

        let summary = match self
            .retry
            .call("summarize", move |_| service.summarize(title, text))
            .await
        {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(title, error = %e, "analysis unavailable, using defaults");
                return AnalysisResult::degraded(title);
            }
        };

        let Summary { summary, tags } = summary;
        let (summary_ref, tags_ref) = (summary.as_str(), tags.as_slice());
        let classification = self
            .retry
            .call("classify", move |_| service.classify(title, summary_ref, tags_ref))
            .await;

        match classification {
            Ok(classification) => AnalysisResult {
                summary,
                tags,
                classification,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(title, error = %e, "classification unavailable");
                AnalysisResult {
                    summary,
                    tags,
                    classification: Value::Null,
                    degraded: true,
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted analysis service counting its calls
    #[derive(Default)]
    pub struct FakeService {
        pub summarize_calls: AtomicUsize,
        pub classify_calls: AtomicUsize,
        /// Failures returned by the next summarize calls, oldest first
        pub summarize_failures: Mutex<Vec<AnalysisFailure>>,
        pub classify_fails: bool,
    }

    #[async_trait]
    impl AnalysisService for FakeService {
        async fn summarize(&self, title: &str, _text: &str) -> Result<Summary, AnalysisFailure> {
            self.summarize_calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.summarize_failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
            Ok(Summary {
                summary: format!("About {title}"),
                tags: vec!["news".to_string()],
            })
        }

        async fn classify(
            &self,
            _title: &str,
            _summary: &str,
            tags: &[String],
        ) -> Result<Value, AnalysisFailure> {
            self.classify_calls.fetch_add(1, Ordering::SeqCst);
            if self.classify_fails {
                Err(AnalysisFailure::Network("down".to_string()))
            } else {
                Ok(serde_json::json!({ "labels": tags }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeService;
    use super::*;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn analyzer(service: Arc<FakeService>) -> Analyzer {
        Analyzer::new(service, RetryPolicy::new(3, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_full_analysis() {
        let service = Arc::new(FakeService::default());
        let result = analyzer(service.clone()).analyze("Rates", "text").await;

        assert_eq!(result.summary, "About Rates");
        assert_eq!(result.tags, vec!["news"]);
        assert_eq!(result.classification, json!({"labels": ["news"]}));
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let service = Arc::new(FakeService {
            summarize_failures: std::sync::Mutex::new(vec![AnalysisFailure::EmptyResponse]),
            ..FakeService::default()
        });
        let result = analyzer(service.clone()).analyze("Rates", "text").await;

        assert_eq!(service.summarize_calls.load(Ordering::SeqCst), 2);
        assert!(!result.degraded);
    }

    #[tokio::test]
    async fn test_exhausted_summary_degrades_and_skips_classify() {
        let failures = vec![AnalysisFailure::Network("down".to_string()); 3];
        let service = Arc::new(FakeService {
            summarize_failures: std::sync::Mutex::new(failures),
            ..FakeService::default()
        });
        let result = analyzer(service.clone()).analyze("Rates", "text").await;

        assert_eq!(service.summarize_calls.load(Ordering::SeqCst), 3);
        assert_eq!(service.classify_calls.load(Ordering::SeqCst), 0);
        assert_eq!(result, AnalysisResult::degraded("Rates"));
    }

    #[tokio::test]
    async fn test_classification_failure_keeps_summary() {
        let service = Arc::new(FakeService {
            classify_fails: true,
            ..FakeService::default()
        });
        let result = analyzer(service.clone()).analyze("Rates", "text").await;

        assert_eq!(service.classify_calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.summary, "About Rates");
        assert_eq!(result.tags, vec!["news"]);
        assert!(result.classification.is_null());
        assert!(result.degraded);
    }
}
