//! Chat-completions analysis client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint. One client
//! serves summarisation, classification and the extraction chain's remote
//! assist.

use super::payload::{normalize_tags, parse_structured_payload, render_prompt, truncate_chars};
use super::{AnalysisFailure, AnalysisService, Summary};
use crate::config::AnalysisConfig;
use crate::extract::{visible_text, ArticleFields, ExtractError, RemoteAssist};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful news editor. \
Always answer with a single JSON object and nothing else.";

const DEFAULT_SUMMARY_PROMPT: &str = "Summarise the article below in two or three sentences \
and list up to five short topical tags.\n\
Answer as {\"summary\": \"...\", \"tags\": [\"...\"]}.\n\n\
Title: {title}\n\nArticle:\n{content}";

const DEFAULT_CLASSIFY_PROMPT: &str = "Classify the article below using the taxonomy.\n\
Taxonomy:\n{taxonomy}\n\n\
Answer as {\"classification\": ...} where the value names the best matching labels.\n\n\
Title: {title}\nSummary: {summary}\nTags: {tags}";

const DESCRIBE_PROMPT: &str = "The text below was taken from a web page whose article body \
could not be located. Recover the article.\n\
Answer as {\"title\": \"...\", \"author\": \"...\", \"publish_date\": \"...\", \"plain_text\": \"...\"} \
using empty strings for unknown fields.\n\nURL: {url}\n\nPage text:\n{content}";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryPayload {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    tags: Value,
}

#[derive(Debug, Default, Deserialize)]
struct DescribePayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    publish_date: Option<String>,
    #[serde(default)]
    plain_text: Option<String>,
}

/// Analysis-service client for OpenAI-compatible chat APIs
pub struct ChatAnalysisClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_input_chars: usize,
    taxonomy: Vec<String>,
    system_prompt: String,
    summary_prompt: String,
    classify_prompt: String,
}

impl ChatAnalysisClient {
    /// Builds a client; `api_key` comes from `config::resolve_api_key`
    pub fn new(config: &AnalysisConfig, api_key: String) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_input_chars: config.max_input_chars,
            taxonomy: config.taxonomy.clone(),
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            summary_prompt: config
                .summary_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SUMMARY_PROMPT.to_string()),
            classify_prompt: config
                .classify_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_CLASSIFY_PROMPT.to_string()),
        })
    }

    /// Sends one system + user exchange and returns the reply text
    pub async fn chat(&self, user_prompt: &str) -> Result<String, AnalysisFailure> {
        let start = std::time::Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalysisFailure::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisFailure::Api {
                status: status.as_u16(),
                message: truncate_chars(&message, 200).to_string(),
            });
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| AnalysisFailure::MalformedPayload(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AnalysisFailure::EmptyResponse)?;

        tracing::debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "chat completion"
        );
        Ok(content)
    }

    fn taxonomy_block(&self) -> String {
        if self.taxonomy.is_empty() {
            "(free-form: choose a short label)".to_string()
        } else {
            self.taxonomy
                .iter()
                .enumerate()
                .map(|(i, label)| format!("{}. {}", i + 1, label))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

#[async_trait]
impl AnalysisService for ChatAnalysisClient {
    async fn summarize(&self, title: &str, text: &str) -> Result<Summary, AnalysisFailure> {
        let prompt = render_prompt(
            &self.summary_prompt,
            &[
                ("title", title),
                ("content", truncate_chars(text, self.max_input_chars)),
            ],
        );

        let reply = self.chat(&prompt).await?;
        let payload: SummaryPayload = parse_structured_payload(&reply)?;

        let summary = payload.summary.trim().to_string();
        if summary.is_empty() {
            return Err(AnalysisFailure::MalformedPayload(
                "reply has no summary".to_string(),
            ));
        }

        Ok(Summary {
            summary,
            tags: normalize_tags(&payload.tags),
        })
    }

    async fn classify(
        &self,
        title: &str,
        summary: &str,
        tags: &[String],
    ) -> Result<Value, AnalysisFailure> {
        let taxonomy = self.taxonomy_block();
        let tags = tags.join(", ");
        let prompt = render_prompt(
            &self.classify_prompt,
            &[
                ("taxonomy", taxonomy.as_str()),
                ("title", title),
                ("summary", summary),
                ("tags", tags.as_str()),
            ],
        );

        let reply = self.chat(&prompt).await?;
        let payload: Value = parse_structured_payload(&reply)?;

        let classification = match payload.get("classification") {
            Some(value) => value.clone(),
            None => payload,
        };
        if classification.is_null() {
            return Err(AnalysisFailure::MalformedPayload(
                "reply has no classification".to_string(),
            ));
        }
        Ok(classification)
    }
}

#[async_trait]
impl RemoteAssist for ChatAnalysisClient {
    async fn describe(&self, url: &str, html: &str) -> Result<ArticleFields, ExtractError> {
        let text = visible_text(html);
        let prompt = render_prompt(
            DESCRIBE_PROMPT,
            &[
                ("url", url),
                ("content", truncate_chars(&text, self.max_input_chars)),
            ],
        );

        let reply = self
            .chat(&prompt)
            .await
            .map_err(|e| ExtractError::Remote(e.to_string()))?;
        let payload: DescribePayload =
            parse_structured_payload(&reply).map_err(|e| ExtractError::Remote(e.to_string()))?;

        let clean = |field: Option<String>| {
            field
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        Ok(ArticleFields {
            title: clean(payload.title),
            author: clean(payload.author),
            publish_date: clean(payload.publish_date),
            plain_text: clean(payload.plain_text).unwrap_or_default(),
        })
    }
}
