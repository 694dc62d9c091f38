//! Domain-specific handlers
//!
//! A handler is plain data: either a set of CSS selectors or the JSON-LD
//! reader. Registering a domain means adding a `(pattern, DomainHandler)` pair
//! to the [`HandlerRegistry`].

use super::html::{block_text, non_empty, selector};
use super::{ArticleFields, ExtractError};
use crate::config::{ExtractionConfig, HandlerEntry, HandlerKind};
use crate::url::matches_wildcard;
use scraper::{Html, Selector};
use serde_json::Value;

/// CSS selectors for the fields of one site's article pages
#[derive(Debug, Clone)]
pub struct SelectorRule {
    title: Option<Selector>,
    author: Option<Selector>,
    publish_date: Option<Selector>,
    body: Selector,
}

impl SelectorRule {
    pub fn parse(
        title: Option<&str>,
        author: Option<&str>,
        publish_date: Option<&str>,
        body: &str,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            title: title.map(selector).transpose()?,
            author: author.map(selector).transpose()?,
            publish_date: publish_date.map(selector).transpose()?,
            body: selector(body)?,
        })
    }

    fn extract(&self, html: &str) -> ArticleFields {
        let document = Html::parse_document(html);
        let field = |sel: &Option<Selector>| {
            sel.as_ref().and_then(|sel| {
                document
                    .select(sel)
                    .find_map(|el| non_empty(&el.text().collect::<String>()))
            })
        };

        let plain_text = document
            .select(&self.body)
            .map(block_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        ArticleFields {
            title: field(&self.title),
            author: field(&self.author),
            publish_date: field(&self.publish_date),
            plain_text,
        }
    }
}

/// An extraction strategy bound to a domain
#[derive(Debug, Clone)]
pub enum DomainHandler {
    Selectors(SelectorRule),
    JsonLd,
}

impl DomainHandler {
    /// The built-in handler for WeChat official-account articles
    pub fn wechat() -> Result<Self, ExtractError> {
        Ok(DomainHandler::Selectors(SelectorRule::parse(
            Some("#activity-name"),
            Some("#js_name"),
            Some("#publish_time"),
            "#js_content",
        )?))
    }

    pub fn from_entry(entry: &HandlerEntry) -> Result<Self, ExtractError> {
        match entry.kind {
            HandlerKind::JsonLd => Ok(DomainHandler::JsonLd),
            HandlerKind::Selectors => {
                let body = entry.body.as_deref().ok_or_else(|| ExtractError::Handler {
                    domain: entry.domain.clone(),
                    message: "selector handlers need a body selector".to_string(),
                })?;
                Ok(DomainHandler::Selectors(SelectorRule::parse(
                    entry.title.as_deref(),
                    entry.author.as_deref(),
                    entry.publish_date.as_deref(),
                    body,
                )?))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DomainHandler::Selectors(_) => "selectors",
            DomainHandler::JsonLd => "json-ld",
        }
    }

    pub fn extract(&self, html: &str) -> Result<ArticleFields, ExtractError> {
        match self {
            DomainHandler::Selectors(rule) => Ok(rule.extract(html)),
            DomainHandler::JsonLd => extract_json_ld(html),
        }
    }
}

/// Domain pattern to handler mapping; the first registered match wins
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<(String, DomainHandler)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured handlers first, then the built-in ones
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let mut registry = Self::new();
        for entry in &config.handlers {
            registry.register(&entry.domain, DomainHandler::from_entry(entry)?);
        }
        registry.register("mp.weixin.qq.com", DomainHandler::wechat()?);
        Ok(registry)
    }

    pub fn register(&mut self, pattern: &str, handler: DomainHandler) {
        self.handlers.push((pattern.to_lowercase(), handler));
    }

    pub fn lookup(&self, domain: &str) -> Option<&DomainHandler> {
        let domain = domain.to_lowercase();
        self.handlers
            .iter()
            .find(|(pattern, _)| matches_wildcard(pattern, &domain))
            .map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

const ARTICLE_TYPES: &[&str] = &[
    "Article",
    "NewsArticle",
    "BlogPosting",
    "ReportageNews",
    "TechArticle",
];

fn extract_json_ld(html: &str) -> Result<ArticleFields, ExtractError> {
    let document = Html::parse_document(html);
    let scripts = selector(r#"script[type="application/ld+json"]"#)?;

    let mut last_error = None;
    for script in document.select(&scripts) {
        let raw = script.text().collect::<String>();
        let value: Value = match serde_json::from_str(raw.trim()) {
            Ok(value) => value,
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        };

        if let Some(article) = find_article(&value) {
            return Ok(ArticleFields {
                title: string_field(article, "headline").or_else(|| string_field(article, "name")),
                author: article.get("author").and_then(person_name),
                publish_date: string_field(article, "datePublished"),
                plain_text: string_field(article, "articleBody").unwrap_or_default(),
            });
        }
    }

    match last_error {
        Some(e) => Err(ExtractError::Json(e.to_string())),
        None => Ok(ArticleFields::default()),
    }
}

fn find_article(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_article),
        Value::Object(map) => {
            if map.get("@type").is_some_and(is_article_type) {
                return Some(value);
            }
            map.get("@graph").and_then(find_article)
        }
        _ => None,
    }
}

fn is_article_type(kind: &Value) -> bool {
    match kind {
        Value::String(s) => ARTICLE_TYPES.contains(&s.as_str()),
        Value::Array(kinds) => kinds.iter().any(is_article_type),
        _ => false,
    }
}

fn string_field(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).and_then(non_empty)
}

fn person_name(author: &Value) -> Option<String> {
    match author {
        Value::String(name) => non_empty(name),
        Value::Object(_) => string_field(author, "name"),
        Value::Array(people) => {
            let names: Vec<String> = people.iter().filter_map(person_name).collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    }
}
