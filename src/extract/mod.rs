//! Article extraction
//!
//! [`ExtractionChain`] turns a fetched page into an [`ExtractedArticle`] by
//! trying, in order:
//!
//! 1. the domain handler registered for the page's domain, used exclusively;
//! 2. the text-density extractor;
//! 3. the container extractor, whose fields only fill what step 2 left empty;
//! 4. the remote-assist fallback, which always produces a body.
//!
//! The first step that yields a body ends the chain. Errors inside a step
//! count as an empty result for that step.

mod generic;
mod handlers;
mod html;
mod language;
mod remote;
mod structured;

pub use generic::ContainerExtractor;
pub use handlers::{DomainHandler, HandlerRegistry, SelectorRule};
pub use html::visible_text;
pub use language::detect_language;
pub use remote::{remote_fallback, RemoteAssist};
pub use structured::DensityExtractor;

use crate::config::ExtractionConfig;
use crate::fetcher::RawPage;
use crate::url::extract_domain;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors raised inside a single extraction strategy
///
/// The chain never propagates these; they are logged and the strategy
/// counts as empty.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("handler for {domain}: {message}")]
    Handler { domain: String, message: String },

    #[error("invalid JSON-LD: {0}")]
    Json(String),

    #[error("invalid page URL: {0}")]
    Url(String),

    #[error("remote assist failed: {0}")]
    Remote(String),
}

/// Article fields produced by one strategy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub plain_text: String,
}

impl ArticleFields {
    /// Fills every empty field from `other`; populated fields are kept
    pub fn merge_missing(&mut self, other: ArticleFields) {
        if self.title.is_none() {
            self.title = other.title;
        }
        if self.author.is_none() {
            self.author = other.author;
        }
        if self.publish_date.is_none() {
            self.publish_date = other.publish_date;
        }
        if self.plain_text.trim().is_empty() {
            self.plain_text = other.plain_text;
        }
    }
}

/// Result of one strategy: a usable body, or an explicit empty marker that
/// may still carry metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    Found(ArticleFields),
    Empty(ArticleFields),
}

impl StrategyOutcome {
    fn classify(fields: ArticleFields, min_body_chars: usize) -> Self {
        if fields.plain_text.trim().chars().count() >= min_body_chars.max(1) {
            StrategyOutcome::Found(fields)
        } else {
            StrategyOutcome::Empty(fields)
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, StrategyOutcome::Found(_))
    }

    pub fn into_fields(self) -> ArticleFields {
        match self {
            StrategyOutcome::Found(fields) | StrategyOutcome::Empty(fields) => fields,
        }
    }
}

/// A local (synchronous) extraction heuristic
pub trait ArticleExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, html: &str, url: &Url) -> Result<ArticleFields, ExtractError>;
}

/// The article produced for one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub plain_text: String,
    pub source_html: String,
    /// Name of the step that produced the body
    pub strategy: String,
    /// ISO 639-1 code of the body's language, when detectable
    pub language: Option<String>,
}

impl ExtractedArticle {
    fn new(fields: ArticleFields, source_html: &str, strategy: &str) -> Self {
        let language = detect_language(&fields.plain_text);
        Self {
            title: fields.title,
            author: fields.author,
            publish_date: fields.publish_date,
            plain_text: fields.plain_text,
            source_html: source_html.to_string(),
            strategy: strategy.to_string(),
            language,
        }
    }

    /// True when no step produced any text
    pub fn is_empty(&self) -> bool {
        self.plain_text.trim().is_empty()
    }
}

/// What the local steps concluded about a page
#[derive(Debug)]
enum LocalResult {
    /// A domain handler or local extractor produced a body
    Done(ArticleFields, String),
    /// Only the remote fallback is left; carries any metadata found so far
    NeedsRemote(ArticleFields),
}

/// Prioritised extraction strategies with a terminal remote fallback
pub struct ExtractionChain {
    handlers: HandlerRegistry,
    structured: Box<dyn ArticleExtractor>,
    generic: Box<dyn ArticleExtractor>,
    remote: Option<Arc<dyn RemoteAssist>>,
    min_body_chars: usize,
}

impl ExtractionChain {
    /// Builds the chain from configuration; no remote assist is attached
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            handlers: HandlerRegistry::from_config(config)?,
            structured: Box::new(DensityExtractor::new()),
            generic: Box::new(ContainerExtractor::default()),
            remote: None,
            min_body_chars: config.min_body_chars,
        })
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteAssist>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Replaces the two local heuristics
    pub fn with_extractors(
        mut self,
        structured: Box<dyn ArticleExtractor>,
        generic: Box<dyn ArticleExtractor>,
    ) -> Self {
        self.structured = structured;
        self.generic = generic;
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Extracts an article from a fetched page
    ///
    /// The returned body is never empty.
    pub async fn extract(&self, page: &RawPage) -> ExtractedArticle {
        let url = if page.final_url.is_empty() {
            &page.url
        } else {
            &page.final_url
        };

        match self.extract_local(&page.html, url) {
            LocalResult::Done(fields, strategy) => {
                ExtractedArticle::new(fields, &page.html, &strategy)
            }
            LocalResult::NeedsRemote(partial) => {
                tracing::info!(url = %url, "local extraction empty, using remote assist");
                let described = remote_fallback(self.remote.as_deref(), url, &page.html).await;
                // Metadata found locally outranks the fallback's guesses.
                let mut fields = partial;
                fields.plain_text = String::new();
                fields.merge_missing(described);
                ExtractedArticle::new(fields, &page.html, "remote")
            }
        }
    }

    fn extract_local(&self, html: &str, url: &str) -> LocalResult {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(url, error = %e, "cannot parse page URL for extraction");
                return LocalResult::NeedsRemote(ArticleFields::default());
            }
        };

        if let Some(domain) = extract_domain(&parsed) {
            if let Some(handler) = self.handlers.lookup(&domain) {
                tracing::debug!(url, domain = %domain, kind = handler.kind(), "using domain handler");
                let outcome = self.run("domain handler", || handler.extract(html));
                return match outcome {
                    StrategyOutcome::Found(fields) => LocalResult::Done(fields, "domain".to_string()),
                    StrategyOutcome::Empty(fields) => LocalResult::NeedsRemote(fields),
                };
            }
        }

        let mut fields = match self.run(self.structured.name(), || {
            self.structured.extract(html, &parsed)
        }) {
            StrategyOutcome::Found(fields) => {
                return LocalResult::Done(fields, self.structured.name().to_string())
            }
            StrategyOutcome::Empty(fields) => fields,
        };

        let generic = self.run(self.generic.name(), || self.generic.extract(html, &parsed));
        let found = generic.is_found();
        fields.plain_text = String::new();
        fields.merge_missing(generic.into_fields());

        if found {
            LocalResult::Done(fields, self.generic.name().to_string())
        } else {
            fields.plain_text = String::new();
            LocalResult::NeedsRemote(fields)
        }
    }

    fn run<F>(&self, name: &str, strategy: F) -> StrategyOutcome
    where
        F: FnOnce() -> Result<ArticleFields, ExtractError>,
    {
        match strategy() {
            Ok(fields) => {
                let outcome = StrategyOutcome::classify(fields, self.min_body_chars);
                tracing::debug!(strategy = name, found = outcome.is_found(), "strategy finished");
                outcome
            }
            Err(e) => {
                tracing::warn!(strategy = name, error = %e, "strategy failed, treating as empty");
                StrategyOutcome::Empty(ArticleFields::default())
            }
        }
    }
}
