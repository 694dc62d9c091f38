//! Remote-assist fallback
//!
//! The terminal step of the chain. It asks an external text-understanding
//! service to describe the page and, whatever happens, returns a non-empty
//! body: visible document text, then the title, then the URL.

use super::html::{document_title, non_empty, visible_text};
use super::{ArticleFields, ExtractError};
use async_trait::async_trait;
use scraper::Html;

/// An external service that can describe an article page
#[async_trait]
pub trait RemoteAssist: Send + Sync {
    async fn describe(&self, url: &str, html: &str) -> Result<ArticleFields, ExtractError>;
}

/// Runs the remote assist (if any) and guarantees a non-empty body
pub async fn remote_fallback(
    assist: Option<&dyn RemoteAssist>,
    url: &str,
    html: &str,
) -> ArticleFields {
    let mut fields = match assist {
        Some(assist) => match assist.describe(url, html).await {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!(url, error = %e, "remote assist failed");
                ArticleFields::default()
            }
        },
        None => ArticleFields::default(),
    };

    if fields.plain_text.trim().is_empty() {
        let (visible, title) = local_description(html);
        fields.title = fields.title.or(title);
        fields.plain_text = if !visible.is_empty() {
            visible
        } else if let Some(title) = &fields.title {
            title.clone()
        } else {
            url.to_string()
        };
    }

    fields
}

// Html is not Send, so it never lives across an await.
fn local_description(html: &str) -> (String, Option<String>) {
    let title = document_title(&Html::parse_document(html)).and_then(|t| non_empty(&t));
    (visible_text(html), title)
}
