//! Container-first article extractor
//!
//! Looks for the semantic article container a CMS usually emits; when there
//! is none, collects every reasonably long, link-poor paragraph of the page.

use super::html::{
    block_text, collapse_whitespace, document_title, first_text, is_noise, link_text_len,
    meta_content, selector, time_datetime,
};
use super::{ArticleExtractor, ArticleFields, ExtractError};
use scraper::Html;
use url::Url;

/// Article containers in order of trust
const CONTAINERS: &[&str] = &[
    "[itemprop=articleBody]",
    "article",
    ".article-content, .article-body, .post-content, .entry-content, .rich_media_content",
    "main",
    "#content, .content",
];

/// Paragraphs shorter than this are treated as boilerplate
const MIN_PARAGRAPH_CHARS: usize = 25;

/// Heuristic extractor based on article containers and paragraph filtering
#[derive(Debug)]
pub struct ContainerExtractor {
    min_container_chars: usize,
}

impl Default for ContainerExtractor {
    fn default() -> Self {
        Self {
            min_container_chars: 80,
        }
    }
}

impl ContainerExtractor {
    pub fn new(min_container_chars: usize) -> Self {
        Self {
            min_container_chars,
        }
    }

    fn container_text(&self, document: &Html) -> Result<Option<String>, ExtractError> {
        for css in CONTAINERS {
            let sel = selector(css)?;
            let best = document
                .select(&sel)
                .map(block_text)
                .max_by_key(|text| text.chars().count());

            if let Some(text) = best {
                if text.chars().count() >= self.min_container_chars {
                    tracing::debug!(container = css, "article container found");
                    return Ok(Some(text));
                }
            }
        }
        Ok(None)
    }

    fn paragraph_text(&self, document: &Html) -> Result<String, ExtractError> {
        let paragraphs = selector("p")?;
        let links = selector("a")?;

        let kept: Vec<String> = document
            .select(&paragraphs)
            .filter(|p| !p.ancestors().filter_map(scraper::ElementRef::wrap).any(|a| is_noise(&a)))
            .filter_map(|p| {
                let text = collapse_whitespace(&p.text().collect::<String>());
                let len = text.chars().count();
                if len < MIN_PARAGRAPH_CHARS {
                    return None;
                }
                let link_ratio = link_text_len(p, &links) as f64 / len as f64;
                (link_ratio < 0.5).then_some(text)
            })
            .collect();

        Ok(kept.join("\n"))
    }
}

impl ArticleExtractor for ContainerExtractor {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn extract(&self, html: &str, _url: &Url) -> Result<ArticleFields, ExtractError> {
        let document = Html::parse_document(html);

        let plain_text = match self.container_text(&document)? {
            Some(text) => text,
            None => self.paragraph_text(&document)?,
        };

        Ok(ArticleFields {
            title: meta_content(&document, &["og:title", "twitter:title"])
                .or_else(|| first_text(&document, "article h1, h1"))
                .or_else(|| document_title(&document)),
            author: meta_content(&document, &["article:author", "author", "twitter:creator"])
                .or_else(|| first_text(&document, "[itemprop=author]")),
            publish_date: meta_content(
                &document,
                &["article:published_time", "datePublished", "og:published_time", "date"],
            )
            .or_else(|| time_datetime(&document)),
            plain_text,
        })
    }
}
