//! Text-density article extractor
//!
//! Scores every block container by how much non-link text it carries per tag,
//! weighted by punctuation and paragraph counts, and takes the best one as
//! the article body. Metadata comes from headings and article meta tags.

use super::html::{
    block_text, document_title, first_text, is_noise, link_text_len, meta_content, selector,
    time_datetime,
};
use super::{ArticleExtractor, ArticleFields, ExtractError};
use scraper::{ElementRef, Html, Selector};
use url::Url;

const PUNCTUATION: &[char] = &[
    '，', '。', '！', '？', '；', '：', '、', '“', '”', ',', '.', '!', '?', ';', ':', '"',
];

/// Heuristic extractor based on per-node text density
#[derive(Debug, Default)]
pub struct DensityExtractor;

struct Selectors {
    candidates: Selector,
    links: Selector,
    paragraphs: Selector,
    tags: Selector,
}

impl Selectors {
    fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            candidates: selector("article, main, section, div, td")?,
            links: selector("a")?,
            paragraphs: selector("p")?,
            tags: selector("*")?,
        })
    }
}

impl DensityExtractor {
    pub fn new() -> Self {
        Self
    }

    fn score(&self, element: ElementRef<'_>, sels: &Selectors) -> f64 {
        let text = block_text(element);
        let text_len = text.chars().count();
        if text_len == 0 {
            return 0.0;
        }

        let link_len = link_text_len(element, &sels.links).min(text_len);
        let tag_count = element.select(&sels.tags).count();
        let link_tags = element.select(&sels.links).count();
        let paragraphs = element.select(&sels.paragraphs).count();
        let punctuation = text.chars().filter(|c| PUNCTUATION.contains(c)).count();

        let density = (text_len - link_len) as f64 / (tag_count.saturating_sub(link_tags) + 1) as f64;
        density * ((punctuation + 2) as f64).log10() * ((paragraphs + 2) as f64).ln()
    }

    fn body(&self, document: &Html) -> Result<String, ExtractError> {
        let sels = Selectors::new()?;

        let best = document
            .select(&sels.candidates)
            .filter(|el| !is_noise(el))
            .map(|el| (self.score(el, &sels), el))
            .filter(|(score, _)| *score > 0.0)
            .max_by(|(a, _), (b, _)| a.total_cmp(b));

        Ok(best.map(|(_, el)| block_text(el)).unwrap_or_default())
    }
}

impl ArticleExtractor for DensityExtractor {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn extract(&self, html: &str, _url: &Url) -> Result<ArticleFields, ExtractError> {
        let document = Html::parse_document(html);

        Ok(ArticleFields {
            title: first_text(&document, "h1")
                .or_else(|| meta_content(&document, &["og:title"]))
                .or_else(|| document_title(&document)),
            author: meta_content(&document, &["author", "article:author"])
                .or_else(|| first_text(&document, "[rel=author], .author, .byline")),
            publish_date: meta_content(
                &document,
                &["article:published_time", "pubdate", "publishdate", "date"],
            )
            .or_else(|| time_datetime(&document)),
            plain_text: self.body(&document)?,
        })
    }
}
